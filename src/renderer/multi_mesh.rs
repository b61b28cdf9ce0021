use std::sync::Arc;

use glam::{Vec2, Vec4};

use crate::settings::MeshSettings;
use crate::skeleton::{
    AtlasPage, Attachment, BlendMode, Clipper, ConvexClipper, Skeleton, Slot, QUAD_TRIANGLES,
};

use super::color::VertexColor;

/// Largest index count of one mesh.
pub const MAX_INDICES_PER_MESH: usize = u16::MAX as usize;
/// Largest vertex count addressable by 16-bit indices.
pub const MAX_VERTICES_PER_MESH: usize = u16::MAX as usize + 1;

/// Self-contained mesh for one texture page and blend mode.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshBatch {
    pub page_index: u32,
    pub texture_path: Arc<str>,
    pub blend_mode: BlendMode,
    pub positions: Vec<Vec2>,
    pub uvs: Vec<Vec2>,
    /// Packed RGBA, see [`pack_rgba`](super::pack_rgba).
    pub colors: Vec<u32>,
    pub indices: Vec<u16>,
}

impl MeshBatch {
    fn empty(page: &AtlasPage, blend_mode: BlendMode) -> Self {
        Self {
            page_index: page.index,
            texture_path: page.texture_path.clone(),
            blend_mode,
            positions: Vec::new(),
            uvs: Vec::new(),
            colors: Vec::new(),
            indices: Vec::new(),
        }
    }

    fn reset(&mut self, page_index: u32, texture_path: &Arc<str>, blend_mode: BlendMode) {
        self.page_index = page_index;
        self.texture_path = texture_path.clone();
        self.blend_mode = blend_mode;
        self.positions.clear();
        self.uvs.clear();
        self.colors.clear();
        self.indices.clear();
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    fn same_state(&self, other: &MeshBatch) -> bool {
        self.page_index == other.page_index
            && self.blend_mode == other.blend_mode
            && self.texture_path == other.texture_path
    }

    fn append(&mut self, other: &MeshBatch) {
        let offset = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.uvs.extend_from_slice(&other.uvs);
        self.colors.extend_from_slice(&other.colors);
        self.indices
            .extend(other.indices.iter().map(|&i| (u32::from(i) + offset) as u16));
    }
}

/// Output of [`MultiMeshBatcher::generate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiMesh {
    batches: Vec<MeshBatch>,
    raw_vertex_count: usize,
    raw_triangle_count: usize,
}

impl MultiMesh {
    pub fn batches(&self) -> &[MeshBatch] {
        &self.batches
    }

    pub fn batch(&self, index: usize) -> Option<&MeshBatch> {
        self.batches.get(index)
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn raw_vertex_count(&self) -> usize {
        self.raw_vertex_count
    }

    pub fn raw_triangle_count(&self) -> usize {
        self.raw_triangle_count
    }

    pub fn page_indices(&self) -> Vec<u32> {
        self.batches.iter().map(|batch| batch.page_index).collect()
    }

    /// `(vertex_count, index_count)` of batch `index`.
    pub fn mesh_size(&self, index: usize) -> Option<(usize, usize)> {
        self.batch(index)
            .map(|batch| (batch.vertex_count(), batch.index_count()))
    }
}

/// Builds one independent 16-bit mesh per run of attachments that share a
/// texture page and blend mode, for renderers that issue one draw call per
/// texture instead of streaming a shared buffer.
pub struct MultiMeshBatcher<C: Clipper = ConvexClipper> {
    settings: MeshSettings,
    clipper: C,
    world: Vec<Vec2>,
    pieces: Vec<MeshBatch>,
    piece_count: usize,
    output: MultiMesh,
}

impl MultiMeshBatcher<ConvexClipper> {
    pub fn new(settings: MeshSettings) -> Self {
        Self::with_clipper(settings, ConvexClipper::new())
    }
}

impl<C: Clipper> MultiMeshBatcher<C> {
    pub fn with_clipper(settings: MeshSettings, clipper: C) -> Self {
        Self {
            settings,
            clipper,
            world: Vec::new(),
            pieces: Vec::new(),
            piece_count: 0,
            output: MultiMesh::default(),
        }
    }

    pub fn output(&self) -> &MultiMesh {
        &self.output
    }

    pub fn generate(&mut self, skeleton: &Skeleton) -> &MultiMesh {
        self.collect_pieces(skeleton);
        self.merge_pieces();

        log::debug!(
            "Merged {} attachments into {} meshes ({} vertices, {} indices)",
            self.piece_count,
            self.output.batches.len(),
            self.output.raw_vertex_count,
            self.output.raw_triangle_count
        );
        &self.output
    }

    /// First pass: one piece per visible attachment, clipped when a clip
    /// region is open.
    fn collect_pieces(&mut self, skeleton: &Skeleton) {
        self.piece_count = 0;
        let use_clipping = self.settings.use_clipping;

        for (_, slot) in skeleton.drawn_slots() {
            if !slot.bone_active || slot.color.w == 0.0 {
                self.clipper.clip_end_slot(slot);
                continue;
            }

            let (page, uvs, triangles, attachment_color) = match skeleton.slot_attachment(slot) {
                Some(Attachment::Region(region)) if region.color.w != 0.0 => {
                    region.compute_world_vertices(&slot.bone_transform, &mut self.world);
                    (&region.page, &region.uvs[..], &QUAD_TRIANGLES[..], region.color)
                }
                Some(Attachment::Mesh(mesh))
                    if mesh.color.w != 0.0 && mesh.is_drawable() =>
                {
                    mesh.compute_world_vertices(&slot.bone_transform, &mut self.world);
                    (&mesh.page, &mesh.uvs[..], &mesh.triangles[..], mesh.color)
                }
                Some(Attachment::Clipping(clip)) => {
                    if use_clipping {
                        self.clipper.clip_start(slot, clip);
                    }
                    continue;
                }
                _ => {
                    self.clipper.clip_end_slot(slot);
                    continue;
                }
            };

            let color = packed_color(skeleton.color, slot, attachment_color, &self.settings);
            let (positions, uvs, triangles) = if use_clipping && self.clipper.is_clipping() {
                self.clipper.clip_triangles(&self.world, triangles, uvs);
                (
                    self.clipper.clipped_vertices(),
                    self.clipper.clipped_uvs(),
                    self.clipper.clipped_triangles(),
                )
            } else {
                (&self.world[..], uvs, triangles)
            };

            let vertex_count = positions.len().min(uvs.len());
            if vertex_count == 0 || triangles.is_empty() {
                self.clipper.clip_end_slot(slot);
                continue;
            }
            if vertex_count > MAX_VERTICES_PER_MESH || triangles.len() > MAX_INDICES_PER_MESH {
                log::warn!(
                    "Attachment on slot '{}' exceeds 16-bit mesh limits ({} vertices, {} indices); skipped",
                    slot.name,
                    vertex_count,
                    triangles.len()
                );
                self.clipper.clip_end_slot(slot);
                continue;
            }

            if self.piece_count == self.pieces.len() {
                self.pieces.push(MeshBatch::empty(page, slot.blend_mode));
            }
            let piece = &mut self.pieces[self.piece_count];
            piece.reset(page.index, &page.texture_path, slot.blend_mode);
            piece.positions.extend_from_slice(&positions[..vertex_count]);
            piece.uvs.extend_from_slice(&uvs[..vertex_count]);
            piece.colors.resize(vertex_count, color);
            piece.indices.extend_from_slice(triangles);
            self.piece_count += 1;

            self.clipper.clip_end_slot(slot);
        }

        self.clipper.clip_end();
    }

    /// Second pass: coalesce consecutive same-state pieces while the merged
    /// mesh stays addressable with 16-bit indices.
    fn merge_pieces(&mut self) {
        let pieces = &self.pieces[..self.piece_count];
        let output = &mut self.output;
        output.raw_vertex_count = 0;
        output.raw_triangle_count = 0;

        let mut batch_count = 0;
        let mut start = 0;
        while start < pieces.len() {
            let first = &pieces[start];
            let mut vertex_count = first.vertex_count();
            let mut index_count = first.index_count();
            let mut end = start + 1;

            while let Some(next) = pieces.get(end) {
                if !first.same_state(next)
                    || vertex_count + next.vertex_count() > MAX_VERTICES_PER_MESH
                    || index_count + next.index_count() > MAX_INDICES_PER_MESH
                {
                    break;
                }
                vertex_count += next.vertex_count();
                index_count += next.index_count();
                end += 1;
            }

            if batch_count == output.batches.len() {
                output.batches.push(first.clone());
            }
            let batch = &mut output.batches[batch_count];
            batch.reset(first.page_index, &first.texture_path, first.blend_mode);
            batch.positions.reserve(vertex_count);
            batch.indices.reserve(index_count);
            for piece in &pieces[start..end] {
                batch.append(piece);
            }

            output.raw_vertex_count += vertex_count;
            output.raw_triangle_count += index_count;
            batch_count += 1;
            start = end;
        }

        output.batches.truncate(batch_count);
    }
}

fn packed_color(
    skeleton_color: Vec4,
    slot: &Slot,
    attachment_color: Vec4,
    settings: &MeshSettings,
) -> u32 {
    VertexColor::resolve(skeleton_color, slot, attachment_color, settings).packed()
}
