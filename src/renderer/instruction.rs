use std::sync::Arc;

use crate::asset::Handle;
use crate::skeleton::{Attachment, BlendMode};

/// Texture and blend state shared by every drawable slot in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderState {
    pub page_index: u32,
    pub texture_path: Arc<str>,
    pub blend_mode: BlendMode,
}

/// One draw call's worth of slots, `start_slot..end_slot` in draw order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmeshInstruction {
    pub start_slot: usize,
    pub end_slot: usize,
    /// The batch was cut in front of a separator slot.
    pub force_separate: bool,
    /// Draw-order index of a clipping attachment whose region is still open
    /// when this batch starts.
    pub pre_active_clipping_slot_source: Option<usize>,
    pub raw_vertex_count: usize,
    pub raw_triangle_count: usize,
    /// Running vertex count of the whole frame when this batch opened.
    pub raw_first_vertex_index: usize,
    pub has_clipping: bool,
    pub has_pma_additive_slot: bool,
    /// `None` while the batch holds no drawable attachment.
    pub state: Option<RenderState>,
    pub region_hash_code: Option<u64>,
    pub region_slot_index: Option<usize>,
}

impl SubmeshInstruction {
    pub(crate) fn open(start_slot: usize, raw_first_vertex_index: usize) -> Self {
        Self {
            start_slot,
            end_slot: start_slot,
            raw_first_vertex_index,
            ..Self::default()
        }
    }

    pub fn slot_count(&self) -> usize {
        self.end_slot - self.start_slot
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.state
            .as_ref()
            .map_or(BlendMode::Normal, |state| state.blend_mode)
    }

    pub fn page_index(&self) -> Option<u32> {
        self.state.as_ref().map(|state| state.page_index)
    }

    pub fn texture_path(&self) -> Option<&str> {
        self.state.as_ref().map(|state| &*state.texture_path)
    }

    fn same_shape(&self, other: &Self) -> bool {
        self.raw_vertex_count == other.raw_vertex_count
            && self.start_slot == other.start_slot
            && self.end_slot == other.end_slot
            && self.raw_triangle_count == other.raw_triangle_count
            && self.raw_first_vertex_index == other.raw_first_vertex_index
    }
}

/// Geometry-free description of a batch for hosts that size their meshes
/// before the vertex data exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmeshShape {
    pub region_hash_code: Option<u64>,
    pub end_slot: usize,
    pub raw_triangle_count: usize,
    pub raw_vertex_count: usize,
    pub region_slot_index: Option<usize>,
}

/// The batch plan for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RendererInstruction {
    pub submeshes: Vec<SubmeshInstruction>,
    pub raw_vertex_count: usize,
    pub raw_triangle_count: usize,
    pub has_active_clipping: bool,
    pub immutable_triangles: bool,
    /// Attachment bound to each draw-order position; `None` for empty or
    /// inactive slots.
    pub attachments: Vec<Option<Handle<Attachment>>>,
}

impl RendererInstruction {
    pub fn clear(&mut self) {
        self.submeshes.clear();
        self.raw_vertex_count = 0;
        self.raw_triangle_count = 0;
        self.has_active_clipping = false;
        self.immutable_triangles = false;
        self.attachments.clear();
    }

    pub fn submesh_count(&self) -> usize {
        self.submeshes.len()
    }

    pub fn submesh_shapes(&self) -> Vec<SubmeshShape> {
        self.submeshes
            .iter()
            .map(|submesh| SubmeshShape {
                region_hash_code: submesh.region_hash_code,
                end_slot: submesh.end_slot,
                raw_triangle_count: submesh.raw_triangle_count,
                raw_vertex_count: submesh.raw_vertex_count,
                region_slot_index: submesh.region_slot_index,
            })
            .collect()
    }

    pub fn submesh_triangle_counts(&self) -> Vec<usize> {
        self.submeshes
            .iter()
            .map(|submesh| submesh.raw_triangle_count)
            .collect()
    }

    /// Whether triangles built for `previous` can't be reused for `self`.
    ///
    /// Looks only at instruction metadata. Any clipping counts as a change
    /// since clipped topology depends on the pose.
    pub fn geometry_changed_from(&self, previous: &RendererInstruction) -> bool {
        if self.has_active_clipping || previous.has_active_clipping {
            return true;
        }

        if self.raw_vertex_count != previous.raw_vertex_count
            || self.immutable_triangles != previous.immutable_triangles
            || self.attachments != previous.attachments
            || self.submeshes.len() != previous.submeshes.len()
        {
            return true;
        }

        self.submeshes
            .iter()
            .zip(&previous.submeshes)
            .any(|(current, previous)| !current.same_shape(previous))
    }
}

/// Previous and current instruction, swapped each frame.
#[derive(Debug, Default)]
pub struct InstructionHistory {
    previous: RendererInstruction,
    current: RendererInstruction,
}

impl InstructionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the current instruction into the previous slot and hands back a
    /// cleared instruction to build this frame into. Allocations are reused.
    pub fn advance(&mut self) -> &mut RendererInstruction {
        std::mem::swap(&mut self.previous, &mut self.current);
        self.current.clear();
        &mut self.current
    }

    pub fn current(&self) -> &RendererInstruction {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut RendererInstruction {
        &mut self.current
    }

    pub fn previous(&self) -> &RendererInstruction {
        &self.previous
    }

    pub fn has_changed(&self) -> bool {
        let changed = self.current.geometry_changed_from(&self.previous);
        log::trace!("Instruction change detection: changed = {}", changed);
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruction(vertex_counts: &[usize]) -> RendererInstruction {
        let mut instruction = RendererInstruction::default();
        let mut first = 0;
        for (index, &count) in vertex_counts.iter().enumerate() {
            instruction.submeshes.push(SubmeshInstruction {
                start_slot: index,
                end_slot: index + 1,
                raw_vertex_count: count,
                raw_triangle_count: count / 4 * 6,
                raw_first_vertex_index: first,
                ..SubmeshInstruction::default()
            });
            first += count;
        }
        instruction.raw_vertex_count = first;
        instruction.attachments = vec![Some(Handle::new(0, 0)); vertex_counts.len()];
        instruction
    }

    #[test]
    fn identical_instructions_are_unchanged() {
        let a = instruction(&[4, 8]);
        assert!(!a.geometry_changed_from(&a.clone()));
    }

    #[test]
    fn clipping_always_counts_as_changed() {
        let mut a = instruction(&[4]);
        a.has_active_clipping = true;
        assert!(a.geometry_changed_from(&a.clone()));
    }

    #[test]
    fn attachment_swap_is_a_change() {
        let a = instruction(&[4, 4]);
        let mut b = a.clone();
        b.attachments[1] = Some(Handle::new(1, 0));
        assert!(b.geometry_changed_from(&a));
    }

    #[test]
    fn moved_boundary_is_a_change() {
        let a = instruction(&[4, 4]);
        let mut b = a.clone();
        b.submeshes[0].end_slot = 2;
        assert!(b.geometry_changed_from(&a));
    }

    #[test]
    fn render_state_alone_does_not_force_rebuild() {
        let a = instruction(&[4]);
        let mut b = a.clone();
        b.submeshes[0].state = Some(RenderState {
            page_index: 3,
            texture_path: Arc::from("other.png"),
            blend_mode: BlendMode::Screen,
        });
        assert!(!b.geometry_changed_from(&a));
    }

    #[test]
    fn history_swaps_and_clears() {
        let mut history = InstructionHistory::new();
        *history.advance() = instruction(&[4]);
        assert_eq!(history.current().raw_vertex_count, 4);

        let current = history.advance();
        assert!(current.submeshes.is_empty());
        assert_eq!(history.previous().raw_vertex_count, 4);
    }

    #[test]
    fn shapes_mirror_submeshes() {
        let instruction = instruction(&[4, 12]);
        let shapes = instruction.submesh_shapes();

        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[1].end_slot, 2);
        assert_eq!(shapes[1].raw_vertex_count, 12);
        assert_eq!(instruction.submesh_triangle_counts(), vec![6, 18]);
    }
}
