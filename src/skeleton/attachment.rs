use std::sync::Arc;

use glam::{Affine2, Vec2, Vec4};

use super::SlotId;

/// Texture page an attachment samples from. Batches never mix pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasPage {
    pub index: u32,
    pub texture_path: Arc<str>,
}

impl AtlasPage {
    pub fn new(index: u32, texture_path: &str) -> Arc<Self> {
        Arc::new(Self {
            index,
            texture_path: Arc::from(texture_path),
        })
    }
}

/// Fixed triangle pattern of a region quad, relative to its first vertex.
pub const QUAD_TRIANGLES: [u16; 6] = [0, 2, 1, 2, 3, 0];

/// Textured quad. Corners are stored in emission order: bottom-left,
/// bottom-right, top-right, top-left, so [`QUAD_TRIANGLES`] splits it along
/// the bottom-left/top-right diagonal.
#[derive(Debug, Clone)]
pub struct RegionAttachment {
    pub name: String,
    pub page: Arc<AtlasPage>,
    /// Corner offsets in bone space.
    pub offsets: [Vec2; 4],
    pub uvs: [Vec2; 4],
    pub color: Vec4,
}

impl RegionAttachment {
    /// Axis-aligned quad of `size` centred on the bone, mapped to the UV
    /// rectangle `uv_min..uv_max` (v grows downwards in texture space).
    pub fn centered(
        name: impl Into<String>,
        page: Arc<AtlasPage>,
        size: Vec2,
        uv_min: Vec2,
        uv_max: Vec2,
    ) -> Self {
        let half = size * 0.5;
        Self {
            name: name.into(),
            page,
            offsets: [
                Vec2::new(-half.x, -half.y),
                Vec2::new(half.x, -half.y),
                Vec2::new(half.x, half.y),
                Vec2::new(-half.x, half.y),
            ],
            uvs: [
                Vec2::new(uv_min.x, uv_max.y),
                Vec2::new(uv_max.x, uv_max.y),
                Vec2::new(uv_max.x, uv_min.y),
                Vec2::new(uv_min.x, uv_min.y),
            ],
            color: Vec4::ONE,
        }
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }

    pub fn compute_world_vertices(&self, bone: &Affine2, out: &mut Vec<Vec2>) {
        out.clear();
        out.extend(self.offsets.iter().map(|&p| bone.transform_point2(p)));
    }
}

/// Free-form textured mesh with its own triangle list.
#[derive(Debug, Clone)]
pub struct MeshAttachment {
    pub name: String,
    pub page: Arc<AtlasPage>,
    /// Vertex positions in bone space.
    pub vertices: Vec<Vec2>,
    pub uvs: Vec<Vec2>,
    pub triangles: Vec<u16>,
    pub color: Vec4,
}

impl MeshAttachment {
    pub fn new(
        name: impl Into<String>,
        page: Arc<AtlasPage>,
        vertices: Vec<Vec2>,
        uvs: Vec<Vec2>,
        triangles: Vec<u16>,
    ) -> Self {
        Self {
            name: name.into(),
            page,
            vertices,
            uvs,
            triangles,
            color: Vec4::ONE,
        }
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }

    /// Length of the flattened `x, y` world vertex array.
    pub fn world_vertices_length(&self) -> usize {
        self.vertices.len() * 2
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Has vertices, a UV per vertex and at least one triangle.
    pub fn is_drawable(&self) -> bool {
        !self.vertices.is_empty()
            && self.uvs.len() >= self.vertices.len()
            && !self.triangles.is_empty()
    }

    pub fn compute_world_vertices(&self, bone: &Affine2, out: &mut Vec<Vec2>) {
        out.clear();
        out.extend(self.vertices.iter().map(|&p| bone.transform_point2(p)));
    }
}

/// Polygon that clips every following slot until `end_slot` is reached.
#[derive(Debug, Clone)]
pub struct ClippingAttachment {
    pub name: String,
    /// Polygon in bone space.
    pub vertices: Vec<Vec2>,
    /// Slot at which the clip region closes; `None` keeps it open to the end
    /// of the draw order.
    pub end_slot: Option<SlotId>,
}

impl ClippingAttachment {
    pub fn new(name: impl Into<String>, vertices: Vec<Vec2>, end_slot: Option<SlotId>) -> Self {
        Self {
            name: name.into(),
            vertices,
            end_slot,
        }
    }

    pub fn compute_world_vertices(&self, bone: &Affine2, out: &mut Vec<Vec2>) {
        out.clear();
        out.extend(self.vertices.iter().map(|&p| bone.transform_point2(p)));
    }
}

#[derive(Debug, Clone)]
pub enum Attachment {
    Region(RegionAttachment),
    Mesh(MeshAttachment),
    Clipping(ClippingAttachment),
    /// Attachment kinds the batcher does not draw (bounding boxes, points,
    /// paths). Kept so draw-order bookkeeping still sees the slot.
    Other { name: String },
}

impl Attachment {
    pub fn name(&self) -> &str {
        match self {
            Attachment::Region(region) => &region.name,
            Attachment::Mesh(mesh) => &mesh.name,
            Attachment::Clipping(clip) => &clip.name,
            Attachment::Other { name } => name,
        }
    }

    /// Atlas page of a drawable attachment.
    pub fn page(&self) -> Option<&Arc<AtlasPage>> {
        match self {
            Attachment::Region(region) => Some(&region.page),
            Attachment::Mesh(mesh) => Some(&mesh.page),
            _ => None,
        }
    }

    /// Tint of a drawable attachment.
    pub fn color(&self) -> Option<Vec4> {
        match self {
            Attachment::Region(region) => Some(region.color),
            Attachment::Mesh(mesh) => Some(mesh.color),
            _ => None,
        }
    }

    /// Whether the attachment produces geometry. Builders and generators
    /// must agree on this so counted vertices match written ones.
    pub fn is_drawable(&self) -> bool {
        match self {
            Attachment::Region(_) => true,
            Attachment::Mesh(mesh) => mesh.is_drawable(),
            _ => false,
        }
    }

    /// `(vertex_count, index_count)` a drawable attachment contributes before
    /// clipping.
    pub fn raw_counts(&self) -> Option<(usize, usize)> {
        if !self.is_drawable() {
            return None;
        }
        match self {
            Attachment::Region(_) => Some((4, 6)),
            Attachment::Mesh(mesh) => Some((mesh.vertex_count(), mesh.triangles.len())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_region_follows_bone_transform() {
        let page = AtlasPage::new(0, "atlas.png");
        let region =
            RegionAttachment::centered("r", page, Vec2::new(2.0, 4.0), Vec2::ZERO, Vec2::ONE);
        let bone = Affine2::from_translation(Vec2::new(10.0, 0.0));
        let mut out = Vec::new();

        region.compute_world_vertices(&bone, &mut out);

        assert_eq!(
            out,
            vec![
                Vec2::new(9.0, -2.0),
                Vec2::new(11.0, -2.0),
                Vec2::new(11.0, 2.0),
                Vec2::new(9.0, 2.0),
            ]
        );
    }

    #[test]
    fn raw_counts_per_kind() {
        let page = AtlasPage::new(0, "atlas.png");
        let region = Attachment::Region(RegionAttachment::centered(
            "r",
            page.clone(),
            Vec2::ONE,
            Vec2::ZERO,
            Vec2::ONE,
        ));
        let mesh = Attachment::Mesh(MeshAttachment::new(
            "m",
            page,
            vec![Vec2::ZERO, Vec2::X, Vec2::Y],
            vec![Vec2::ZERO, Vec2::X, Vec2::Y],
            vec![0, 1, 2],
        ));
        let other = Attachment::Other {
            name: "bbox".into(),
        };

        assert_eq!(region.raw_counts(), Some((4, 6)));
        assert_eq!(mesh.raw_counts(), Some((3, 3)));
        assert_eq!(other.raw_counts(), None);
    }

    #[test]
    fn incomplete_meshes_are_not_drawable() {
        let page = AtlasPage::new(0, "atlas.png");
        let vertices = vec![Vec2::ZERO, Vec2::X, Vec2::Y];
        let missing_uvs = Attachment::Mesh(MeshAttachment::new(
            "uvs",
            page.clone(),
            vertices.clone(),
            vec![Vec2::ZERO],
            vec![0, 1, 2],
        ));
        let no_triangles = Attachment::Mesh(MeshAttachment::new(
            "triangles",
            page,
            vertices.clone(),
            vertices,
            Vec::new(),
        ));

        for mesh in [missing_uvs, no_triangles] {
            assert!(!mesh.is_drawable(), "{}", mesh.name());
            assert_eq!(mesh.raw_counts(), None);
        }
    }
}
