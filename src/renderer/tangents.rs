use glam::{Vec2, Vec3, Vec4};

use super::buffer::GrowableBuffer;

/// Per-vertex 2D tangents from positions, UVs and triangles.
///
/// Each triangle overwrites the tangent and bitangent of its three vertices,
/// so a vertex shared by several triangles keeps the last one's direction.
/// Triangles are visited in list order, which makes the result a pure
/// function of the input.
#[derive(Debug)]
pub struct TangentSolver {
    scratch: GrowableBuffer<Vec2>,
}

impl TangentSolver {
    pub fn new() -> Self {
        Self {
            scratch: GrowableBuffer::new("tangent scratch"),
        }
    }

    /// Writes one tangent per vertex into `tangents[..positions.len()]`.
    /// Triangles referencing vertices past the end are ignored.
    pub fn solve<'t>(
        &mut self,
        positions: &[Vec3],
        uvs: &[Vec2],
        triangle_lists: impl IntoIterator<Item = &'t [u32]>,
        tangents: &mut [Vec4],
    ) {
        let vertex_count = positions.len().min(uvs.len()).min(tangents.len());

        self.scratch.resize_without_init(vertex_count * 2);
        let scratch = self.scratch.as_mut_slice();
        scratch.fill(Vec2::ZERO);
        let (sdirs, tdirs) = scratch.split_at_mut(vertex_count);

        for triangles in triangle_lists {
            for triangle in triangles.chunks_exact(3) {
                let [i1, i2, i3] = [
                    triangle[0] as usize,
                    triangle[1] as usize,
                    triangle[2] as usize,
                ];
                if i1 >= vertex_count || i2 >= vertex_count || i3 >= vertex_count {
                    continue;
                }

                let (sdir, tdir) = triangle_directions(
                    [positions[i1], positions[i2], positions[i3]],
                    [uvs[i1], uvs[i2], uvs[i3]],
                );
                for i in [i1, i2, i3] {
                    sdirs[i] = sdir;
                    tdirs[i] = tdir;
                }
            }
        }

        for ((tangent, &sdir), &tdir) in tangents.iter_mut().zip(sdirs.iter()).zip(tdirs.iter()) {
            *tangent = finish_tangent(sdir, tdir);
        }
    }
}

impl Default for TangentSolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Solves the 2x2 UV system of one triangle. A degenerate UV mapping yields
/// zero directions.
fn triangle_directions(v: [Vec3; 3], w: [Vec2; 3]) -> (Vec2, Vec2) {
    let x1 = v[1].x - v[0].x;
    let x2 = v[2].x - v[0].x;
    let y1 = v[1].y - v[0].y;
    let y2 = v[2].y - v[0].y;

    let s1 = w[1].x - w[0].x;
    let s2 = w[2].x - w[0].x;
    let t1 = w[1].y - w[0].y;
    let t2 = w[2].y - w[0].y;

    let div = s1 * t2 - s2 * t1;
    let r = if div == 0.0 { 0.0 } else { 1.0 / div };

    let sdir = Vec2::new((t2 * x1 - t1 * x2) * r, (t2 * y1 - t1 * y2) * r);
    let tdir = Vec2::new((s1 * x2 - s2 * x1) * r, (s1 * y2 - s2 * y1) * r);
    (sdir, tdir)
}

fn finish_tangent(sdir: Vec2, tdir: Vec2) -> Vec4 {
    let mut t = sdir;
    let magnitude = t.length();
    if magnitude > 1e-5 {
        t /= magnitude;
    }

    // Handedness of the 2D basis, used to rebuild the binormal.
    let w = if t.y * tdir.x > t.x * tdir.y { 1.0 } else { -1.0 };
    Vec4::new(t.x, t.y, 0.0, w)
}
