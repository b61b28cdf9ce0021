//! Posed skeleton as seen by the batcher: slots in draw order, each with an
//! optional attachment, tint and blend mode. Bone evaluation happens upstream;
//! every slot carries its bone's final world transform.

pub mod attachment;
pub mod clipping;

use glam::{Affine2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::asset::{AssetCache, Handle};

pub use attachment::{
    AtlasPage, Attachment, ClippingAttachment, MeshAttachment, RegionAttachment, QUAD_TRIANGLES,
};
pub use clipping::{Clipper, ConvexClipper};

/// Setup-pose index of a slot. Stable while the draw order changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(pub u32);

impl SlotId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Screen,
}

#[derive(Debug, Clone)]
pub struct Slot {
    pub id: SlotId,
    pub name: String,
    /// False when the slot's bone is skinned out by the current skin.
    pub bone_active: bool,
    pub bone_transform: Affine2,
    pub color: Vec4,
    /// Tint-black color; `None` behaves as black.
    pub dark_color: Option<Vec3>,
    pub blend_mode: BlendMode,
    pub attachment: Option<Handle<Attachment>>,
}

impl Slot {
    fn new(id: SlotId, name: String, blend_mode: BlendMode) -> Self {
        Self {
            id,
            name,
            bone_active: true,
            bone_transform: Affine2::IDENTITY,
            color: Vec4::ONE,
            dark_color: None,
            blend_mode,
            attachment: None,
        }
    }
}

pub struct Skeleton {
    pub color: Vec4,
    slots: Vec<Slot>,
    draw_order: Vec<SlotId>,
    attachments: AssetCache<Attachment>,
}

impl Skeleton {
    pub fn new() -> Self {
        Self {
            color: Vec4::ONE,
            slots: Vec::new(),
            draw_order: Vec::new(),
            attachments: AssetCache::new(),
        }
    }

    /// Adds a slot at the end of both the setup order and the draw order.
    pub fn add_slot(&mut self, name: impl Into<String>, blend_mode: BlendMode) -> SlotId {
        let id = SlotId(self.slots.len() as u32);
        self.slots.push(Slot::new(id, name.into(), blend_mode));
        self.draw_order.push(id);
        id
    }

    pub fn add_attachment(&mut self, attachment: Attachment) -> Handle<Attachment> {
        self.attachments.insert(attachment)
    }

    /// Swaps the attachment data behind `handle`. Every slot still holding the
    /// old handle loses its attachment; callers re-assign the returned handle.
    pub fn replace_attachment(
        &mut self,
        handle: Handle<Attachment>,
        attachment: Attachment,
    ) -> Option<Handle<Attachment>> {
        self.attachments.replace(handle, attachment)
    }

    pub fn set_attachment(&mut self, slot: SlotId, attachment: Option<Handle<Attachment>>) {
        if let Some(slot) = self.slots.get_mut(slot.index()) {
            slot.attachment = attachment;
        }
    }

    pub fn attachment(&self, handle: Handle<Attachment>) -> Option<&Attachment> {
        self.attachments.get(handle)
    }

    pub fn attachment_mut(&mut self, handle: Handle<Attachment>) -> Option<&mut Attachment> {
        self.attachments.get_mut(handle)
    }

    /// Resolves a slot's attachment. Stale handles resolve to nothing.
    pub fn slot_attachment(&self, slot: &Slot) -> Option<&Attachment> {
        slot.attachment.and_then(|handle| self.attachments.get(handle))
    }

    pub fn slot(&self, id: SlotId) -> Option<&Slot> {
        self.slots.get(id.index())
    }

    pub fn slot_mut(&mut self, id: SlotId) -> Option<&mut Slot> {
        self.slots.get_mut(id.index())
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn draw_order(&self) -> &[SlotId] {
        &self.draw_order
    }

    /// Replaces the draw order. Ids that do not name a slot are dropped.
    pub fn set_draw_order(&mut self, order: Vec<SlotId>) {
        let slot_count = self.slots.len();
        self.draw_order = order
            .into_iter()
            .filter(|id| id.index() < slot_count)
            .collect();
    }

    /// Slot at draw-order position `index`.
    pub fn drawn_slot(&self, index: usize) -> Option<&Slot> {
        self.draw_order
            .get(index)
            .and_then(|id| self.slots.get(id.index()))
    }

    /// Slots in draw order, paired with their draw-order position.
    pub fn drawn_slots(&self) -> impl Iterator<Item = (usize, &Slot)> + '_ {
        self.draw_order
            .iter()
            .enumerate()
            .filter_map(move |(index, id)| self.slots.get(id.index()).map(|slot| (index, slot)))
    }
}

impl Default for Skeleton {
    fn default() -> Self {
        Self::new()
    }
}
