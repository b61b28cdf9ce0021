use std::collections::HashSet;

use crate::asset::Handle;
use crate::skeleton::{Attachment, BlendMode, Skeleton, Slot, SlotId};

use super::instruction::{RenderState, RendererInstruction, SubmeshInstruction};

/// Partitions a skeleton's draw order into batches that can each be drawn
/// with one texture and blend state.
#[derive(Debug, Clone, Default)]
pub struct InstructionBuilder {
    separators: HashSet<SlotId>,
    generate_separate_mesh_override: bool,
    immutable_triangles: bool,
}

#[derive(Debug, Clone, Copy)]
struct OpenClip {
    source: usize,
    end_slot: Option<SlotId>,
}

struct Drawable {
    vertex_count: usize,
    triangle_count: usize,
    state: RenderState,
    handle: Handle<Attachment>,
}

impl InstructionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots in front of which a batch is always cut.
    pub fn with_separators(mut self, slots: impl IntoIterator<Item = SlotId>) -> Self {
        self.separators = slots.into_iter().collect();
        self
    }

    /// Lets separators also cut batches that hold no drawable attachment yet.
    pub fn with_separate_mesh_override(mut self, enabled: bool) -> Self {
        self.generate_separate_mesh_override = enabled;
        self
    }

    pub fn with_immutable_triangles(mut self, enabled: bool) -> Self {
        self.immutable_triangles = enabled;
        self
    }

    pub fn is_separator(&self, slot: SlotId) -> bool {
        self.separators.contains(&slot)
    }

    pub fn build(&self, skeleton: &Skeleton, out: &mut RendererInstruction) {
        out.clear();
        out.immutable_triangles = self.immutable_triangles;

        let draw_order_len = skeleton.draw_order().len();
        let mut current = SubmeshInstruction::open(0, 0);
        let mut vertex_total = 0;
        let mut triangle_total = 0;
        let mut clip: Option<OpenClip> = None;

        for (index, slot) in skeleton.drawn_slots() {
            if !slot.bone_active {
                out.attachments.push(None);
                close_clip(&mut clip, slot, index);
                continue;
            }

            out.attachments.push(slot.attachment);
            let attachment = skeleton.slot_attachment(slot);
            let drawable = slot
                .attachment
                .zip(attachment)
                .and_then(|(handle, attachment)| classify(handle, attachment, slot.blend_mode));

            if self.is_separator(slot.id)
                && index > current.start_slot
                && (current.state.is_some() || self.generate_separate_mesh_override)
            {
                cut(out, &mut current, index, vertex_total, clip, true);
            }

            if let Some(drawable) = &drawable {
                if current
                    .state
                    .as_ref()
                    .is_some_and(|state| *state != drawable.state)
                {
                    cut(out, &mut current, index, vertex_total, clip, false);
                }
            }

            if slot.blend_mode == BlendMode::Additive {
                current.has_pma_additive_slot = true;
            }

            match (attachment, drawable) {
                (_, Some(drawable)) => {
                    current.raw_vertex_count += drawable.vertex_count;
                    current.raw_triangle_count += drawable.triangle_count;
                    current.region_hash_code = Some(drawable.handle.hash_code());
                    current.region_slot_index = Some(slot.id.index());
                    current.state = Some(drawable.state);
                    vertex_total += drawable.vertex_count;
                    triangle_total += drawable.triangle_count;
                }
                (Some(Attachment::Clipping(clipping)), None) => {
                    if clip.is_none() {
                        clip = Some(OpenClip {
                            source: index,
                            end_slot: clipping.end_slot,
                        });
                        current.has_clipping = true;
                        out.has_active_clipping = true;
                    }
                }
                (Some(other), None) => {
                    log::trace!(
                        "Slot '{}' holds non-drawable attachment '{}'",
                        slot.name,
                        other.name()
                    );
                }
                (None, None) => {}
            }

            close_clip(&mut clip, slot, index);
        }

        if current.state.is_some() {
            current.end_slot = draw_order_len;
            out.submeshes.push(current);
        } else if let Some(last) = out.submeshes.last_mut() {
            last.end_slot = draw_order_len;
            last.has_clipping |= current.has_clipping;
            last.has_pma_additive_slot |= current.has_pma_additive_slot;
        }

        out.raw_vertex_count = vertex_total;
        out.raw_triangle_count = triangle_total;

        log::trace!(
            "Built instruction: {} submeshes, {} vertices, {} indices",
            out.submeshes.len(),
            vertex_total,
            triangle_total
        );
    }

    /// Builds one batch spanning the whole draw order regardless of render
    /// state. Emits nothing when the skeleton has no vertices.
    pub fn build_single(&self, skeleton: &Skeleton, out: &mut RendererInstruction) {
        out.clear();
        out.immutable_triangles = self.immutable_triangles;

        let mut submesh = SubmeshInstruction::open(0, 0);
        submesh.end_slot = skeleton.draw_order().len();

        for (_, slot) in skeleton.drawn_slots() {
            if !slot.bone_active {
                out.attachments.push(None);
                continue;
            }
            out.attachments.push(slot.attachment);

            if slot.blend_mode == BlendMode::Additive {
                submesh.has_pma_additive_slot = true;
            }

            let Some(handle) = slot.attachment else {
                continue;
            };
            let Some(attachment) = skeleton.attachment(handle) else {
                continue;
            };

            if let Attachment::Clipping(_) = attachment {
                submesh.has_clipping = true;
                out.has_active_clipping = true;
            } else if let Some(drawable) = classify(handle, attachment, slot.blend_mode) {
                submesh.raw_vertex_count += drawable.vertex_count;
                submesh.raw_triangle_count += drawable.triangle_count;
                submesh.region_hash_code = Some(handle.hash_code());
                submesh.region_slot_index = Some(slot.id.index());
                submesh.state.get_or_insert(drawable.state);
            }
        }

        out.raw_vertex_count = submesh.raw_vertex_count;
        out.raw_triangle_count = submesh.raw_triangle_count;
        if submesh.raw_vertex_count > 0 {
            out.submeshes.push(submesh);
        }
    }
}

fn classify(
    handle: Handle<Attachment>,
    attachment: &Attachment,
    blend_mode: BlendMode,
) -> Option<Drawable> {
    let (vertex_count, triangle_count) = attachment.raw_counts()?;
    let page = attachment.page()?;
    Some(Drawable {
        vertex_count,
        triangle_count,
        state: RenderState {
            page_index: page.index,
            texture_path: page.texture_path.clone(),
            blend_mode,
        },
        handle,
    })
}

/// Closes `current` at draw-order index `at` and opens the next batch there.
fn cut(
    out: &mut RendererInstruction,
    current: &mut SubmeshInstruction,
    at: usize,
    vertex_total: usize,
    clip: Option<OpenClip>,
    force_separate: bool,
) {
    let mut next = SubmeshInstruction::open(at, vertex_total);
    next.pre_active_clipping_slot_source = clip.map(|clip| clip.source);
    next.has_clipping = clip.is_some();

    let mut closed = std::mem::replace(current, next);
    closed.end_slot = at;
    closed.force_separate = force_separate;
    out.submeshes.push(closed);
}

fn close_clip(clip: &mut Option<OpenClip>, slot: &Slot, index: usize) {
    if let Some(open) = clip {
        if open.source != index && open.end_slot == Some(slot.id) {
            *clip = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{AtlasPage, ClippingAttachment, RegionAttachment};
    use glam::Vec2;

    fn region(skeleton: &mut Skeleton, name: &str, page: u32) -> Handle<Attachment> {
        let page = AtlasPage::new(page, &format!("page{page}.png"));
        skeleton.add_attachment(Attachment::Region(RegionAttachment::centered(
            name,
            page,
            Vec2::ONE,
            Vec2::ZERO,
            Vec2::ONE,
        )))
    }

    fn slot_with(
        skeleton: &mut Skeleton,
        blend_mode: BlendMode,
        attachment: Option<Handle<Attachment>>,
    ) -> SlotId {
        let id = skeleton.add_slot(format!("slot{}", skeleton.slots().len()), blend_mode);
        skeleton.set_attachment(id, attachment);
        id
    }

    fn ranges(instruction: &RendererInstruction) -> Vec<(usize, usize)> {
        instruction
            .submeshes
            .iter()
            .map(|s| (s.start_slot, s.end_slot))
            .collect()
    }

    #[test]
    fn same_state_slots_share_one_batch() {
        let mut skeleton = Skeleton::new();
        for i in 0..3 {
            let handle = region(&mut skeleton, &format!("r{i}"), 0);
            slot_with(&mut skeleton, BlendMode::Normal, Some(handle));
        }

        let mut instruction = RendererInstruction::default();
        InstructionBuilder::new().build(&skeleton, &mut instruction);

        assert_eq!(ranges(&instruction), vec![(0, 3)]);
        assert_eq!(instruction.raw_vertex_count, 12);
        assert_eq!(instruction.raw_triangle_count, 18);
        assert_eq!(instruction.submeshes[0].region_slot_index, Some(2));
    }

    #[test]
    fn page_and_blend_changes_cut_batches() {
        let mut skeleton = Skeleton::new();
        let a = region(&mut skeleton, "a", 0);
        let b = region(&mut skeleton, "b", 1);
        slot_with(&mut skeleton, BlendMode::Normal, Some(a));
        slot_with(&mut skeleton, BlendMode::Normal, Some(b));
        slot_with(&mut skeleton, BlendMode::Multiply, Some(b));

        let mut instruction = RendererInstruction::default();
        InstructionBuilder::new().build(&skeleton, &mut instruction);

        assert_eq!(ranges(&instruction), vec![(0, 1), (1, 2), (2, 3)]);
        let firsts: Vec<_> = instruction
            .submeshes
            .iter()
            .map(|s| s.raw_first_vertex_index)
            .collect();
        assert_eq!(firsts, vec![0, 4, 8]);
    }

    #[test]
    fn separator_cuts_non_empty_batch() {
        let mut skeleton = Skeleton::new();
        let a = region(&mut skeleton, "a", 0);
        slot_with(&mut skeleton, BlendMode::Normal, Some(a));
        let separator = slot_with(&mut skeleton, BlendMode::Normal, Some(a));

        let mut instruction = RendererInstruction::default();
        InstructionBuilder::new()
            .with_separators([separator])
            .build(&skeleton, &mut instruction);

        assert_eq!(ranges(&instruction), vec![(0, 1), (1, 2)]);
        assert!(instruction.submeshes[0].force_separate);
    }

    #[test]
    fn separator_needs_override_to_cut_empty_batch() {
        let mut skeleton = Skeleton::new();
        let a = region(&mut skeleton, "a", 0);
        slot_with(&mut skeleton, BlendMode::Normal, None);
        let separator = slot_with(&mut skeleton, BlendMode::Normal, Some(a));

        let mut instruction = RendererInstruction::default();
        let builder = InstructionBuilder::new().with_separators([separator]);
        builder.build(&skeleton, &mut instruction);
        assert_eq!(ranges(&instruction), vec![(0, 2)]);

        builder
            .with_separate_mesh_override(true)
            .build(&skeleton, &mut instruction);
        assert_eq!(ranges(&instruction), vec![(0, 1), (1, 2)]);
        assert_eq!(instruction.submeshes[0].raw_vertex_count, 0);
    }

    #[test]
    fn trailing_empty_slots_extend_last_batch() {
        let mut skeleton = Skeleton::new();
        let a = region(&mut skeleton, "a", 0);
        slot_with(&mut skeleton, BlendMode::Normal, Some(a));
        slot_with(&mut skeleton, BlendMode::Additive, None);

        let mut instruction = RendererInstruction::default();
        InstructionBuilder::new().build(&skeleton, &mut instruction);

        assert_eq!(ranges(&instruction), vec![(0, 2)]);
        assert!(instruction.submeshes[0].has_pma_additive_slot);
    }

    #[test]
    fn clip_region_carries_into_following_batches() {
        let mut skeleton = Skeleton::new();
        let a = region(&mut skeleton, "a", 0);
        let b = region(&mut skeleton, "b", 1);
        let clip_slot = slot_with(&mut skeleton, BlendMode::Normal, None);
        slot_with(&mut skeleton, BlendMode::Normal, Some(a));
        slot_with(&mut skeleton, BlendMode::Normal, Some(b));
        let end = slot_with(&mut skeleton, BlendMode::Normal, Some(a));
        slot_with(&mut skeleton, BlendMode::Normal, Some(b));

        let clip = skeleton.add_attachment(Attachment::Clipping(ClippingAttachment::new(
            "clip",
            vec![Vec2::ZERO, Vec2::X, Vec2::ONE],
            Some(end),
        )));
        skeleton.set_attachment(clip_slot, Some(clip));

        let mut instruction = RendererInstruction::default();
        InstructionBuilder::new().build(&skeleton, &mut instruction);

        assert!(instruction.has_active_clipping);
        assert_eq!(ranges(&instruction), vec![(0, 2), (2, 3), (3, 4), (4, 5)]);
        let pre: Vec<_> = instruction
            .submeshes
            .iter()
            .map(|s| s.pre_active_clipping_slot_source)
            .collect();
        assert_eq!(pre, vec![None, Some(0), Some(0), None]);
        let clipped: Vec<_> = instruction.submeshes.iter().map(|s| s.has_clipping).collect();
        assert_eq!(clipped, vec![true, true, true, false]);
    }

    #[test]
    fn inactive_slots_are_skipped_and_not_snapshotted() {
        let mut skeleton = Skeleton::new();
        let a = region(&mut skeleton, "a", 0);
        let hidden = slot_with(&mut skeleton, BlendMode::Normal, Some(a));
        slot_with(&mut skeleton, BlendMode::Normal, Some(a));
        if let Some(slot) = skeleton.slot_mut(hidden) {
            slot.bone_active = false;
        }

        let mut instruction = RendererInstruction::default();
        InstructionBuilder::new().build(&skeleton, &mut instruction);

        assert_eq!(instruction.raw_vertex_count, 4);
        assert_eq!(instruction.attachments, vec![None, Some(a)]);
    }

    #[test]
    fn single_batch_spans_everything() {
        let mut skeleton = Skeleton::new();
        let a = region(&mut skeleton, "a", 0);
        let b = region(&mut skeleton, "b", 1);
        slot_with(&mut skeleton, BlendMode::Normal, Some(a));
        slot_with(&mut skeleton, BlendMode::Screen, Some(b));
        slot_with(&mut skeleton, BlendMode::Normal, None);

        let mut instruction = RendererInstruction::default();
        InstructionBuilder::new().build_single(&skeleton, &mut instruction);

        assert_eq!(ranges(&instruction), vec![(0, 3)]);
        assert_eq!(instruction.raw_vertex_count, 8);
        assert_eq!(instruction.submeshes[0].page_index(), Some(0));
    }

    #[test]
    fn single_batch_is_omitted_without_vertices() {
        let mut skeleton = Skeleton::new();
        slot_with(&mut skeleton, BlendMode::Normal, None);

        let mut instruction = RendererInstruction::default();
        InstructionBuilder::new().build_single(&skeleton, &mut instruction);

        assert!(instruction.submeshes.is_empty());
        assert_eq!(instruction.attachments.len(), 1);
    }
}
