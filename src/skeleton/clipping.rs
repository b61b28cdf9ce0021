use glam::Vec2;

use super::{ClippingAttachment, Slot, SlotId};

/// Stateful clip-region tracker fed by the mesh generator.
///
/// Between `clip_start` and the matching end, `clip_triangles` reduces each
/// attachment's triangles to the part inside the clip polygon. The results
/// stay readable until the next `clip_triangles` call.
pub trait Clipper {
    fn clip_start(&mut self, slot: &Slot, attachment: &ClippingAttachment);

    /// Closes the active region if `slot` is its end slot.
    fn clip_end_slot(&mut self, slot: &Slot);

    fn clip_end(&mut self);

    fn is_clipping(&self) -> bool;

    fn clip_triangles(&mut self, vertices: &[Vec2], triangles: &[u16], uvs: &[Vec2]);

    fn clipped_vertices(&self) -> &[Vec2];

    fn clipped_triangles(&self) -> &[u16];

    fn clipped_uvs(&self) -> &[Vec2];
}

/// Sutherland–Hodgman clipper against a convex polygon. Concave clip
/// polygons are clipped against their winding-corrected outline, which is
/// exact only for convex shapes.
#[derive(Debug, Default)]
pub struct ConvexClipper {
    end_slot: Option<SlotId>,
    active: bool,
    polygon: Vec<Vec2>,
    clipped_vertices: Vec<Vec2>,
    clipped_triangles: Vec<u16>,
    clipped_uvs: Vec<Vec2>,
    input: Vec<(Vec2, Vec2)>,
    output: Vec<(Vec2, Vec2)>,
}

impl ConvexClipper {
    pub fn new() -> Self {
        Self::default()
    }

    fn clip_triangle(&mut self, corners: [(Vec2, Vec2); 3]) {
        self.input.clear();
        self.input.extend_from_slice(&corners);

        let edge_count = self.polygon.len();
        for edge in 0..edge_count {
            let a = self.polygon[edge];
            let b = self.polygon[(edge + 1) % edge_count];
            self.output.clear();

            let count = self.input.len();
            for i in 0..count {
                let current = self.input[i];
                let previous = self.input[(i + count - 1) % count];
                let current_inside = side(a, b, current.0) >= 0.0;
                let previous_inside = side(a, b, previous.0) >= 0.0;

                if current_inside {
                    if !previous_inside {
                        self.output.push(intersect(a, b, previous, current));
                    }
                    self.output.push(current);
                } else if previous_inside {
                    self.output.push(intersect(a, b, previous, current));
                }
            }

            std::mem::swap(&mut self.input, &mut self.output);
            if self.input.len() < 3 {
                return;
            }
        }

        let base = self.clipped_vertices.len();
        if base + self.input.len() > usize::from(u16::MAX) + 1 {
            return;
        }
        for &(position, uv) in &self.input {
            self.clipped_vertices.push(position);
            self.clipped_uvs.push(uv);
        }
        for i in 1..self.input.len() - 1 {
            self.clipped_triangles.push(base as u16);
            self.clipped_triangles.push((base + i) as u16);
            self.clipped_triangles.push((base + i + 1) as u16);
        }
    }
}

impl Clipper for ConvexClipper {
    fn clip_start(&mut self, slot: &Slot, attachment: &ClippingAttachment) {
        if self.active {
            return;
        }

        attachment.compute_world_vertices(&slot.bone_transform, &mut self.polygon);
        if self.polygon.len() < 3 {
            self.polygon.clear();
            return;
        }
        if signed_area(&self.polygon) < 0.0 {
            self.polygon.reverse();
        }

        self.end_slot = attachment.end_slot;
        self.active = true;
    }

    fn clip_end_slot(&mut self, slot: &Slot) {
        if self.active && self.end_slot == Some(slot.id) {
            self.clip_end();
        }
    }

    fn clip_end(&mut self) {
        self.active = false;
        self.end_slot = None;
        self.polygon.clear();
    }

    fn is_clipping(&self) -> bool {
        self.active
    }

    fn clip_triangles(&mut self, vertices: &[Vec2], triangles: &[u16], uvs: &[Vec2]) {
        self.clipped_vertices.clear();
        self.clipped_triangles.clear();
        self.clipped_uvs.clear();

        let corner = |i: u16| {
            let i = usize::from(i);
            Some((*vertices.get(i)?, *uvs.get(i)?))
        };
        for tri in triangles.chunks_exact(3) {
            if let (Some(a), Some(b), Some(c)) = (corner(tri[0]), corner(tri[1]), corner(tri[2])) {
                self.clip_triangle([a, b, c]);
            }
        }
    }

    fn clipped_vertices(&self) -> &[Vec2] {
        &self.clipped_vertices
    }

    fn clipped_triangles(&self) -> &[u16] {
        &self.clipped_triangles
    }

    fn clipped_uvs(&self) -> &[Vec2] {
        &self.clipped_uvs
    }
}

fn side(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b - a).perp_dot(p - a)
}

fn intersect(a: Vec2, b: Vec2, from: (Vec2, Vec2), to: (Vec2, Vec2)) -> (Vec2, Vec2) {
    let d_from = side(a, b, from.0);
    let d_to = side(a, b, to.0);
    let denom = d_from - d_to;
    let t = if denom == 0.0 { 0.0 } else { d_from / denom };
    (from.0.lerp(to.0, t), from.1.lerp(to.1, t))
}

fn signed_area(polygon: &[Vec2]) -> f32 {
    let n = polygon.len();
    (0..n)
        .map(|i| polygon[i].perp_dot(polygon[(i + 1) % n]))
        .sum::<f32>()
        * 0.5
}
