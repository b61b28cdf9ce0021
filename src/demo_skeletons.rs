use glam::{Affine2, Vec2, Vec4};
use skeleton_batcher::renderer::InstructionBuilder;
use skeleton_batcher::skeleton::{
    AtlasPage, Attachment, BlendMode, ClippingAttachment, MeshAttachment, RegionAttachment,
    Skeleton, SlotId,
};

#[derive(Clone, Copy, Debug)]
pub enum DemoSkeleton {
    /// A row of quads on one page.
    Row { count: u32 },
    /// Quads alternating between two pages and an additive glow.
    MixedPages,
    /// A fan mesh clipped by a square mask.
    Clipped,
}

pub struct DemoRig {
    pub skeleton: Skeleton,
    pub builder: InstructionBuilder,
    spinning: Vec<SlotId>,
}

impl DemoSkeleton {
    pub fn build(self) -> DemoRig {
        match self {
            DemoSkeleton::Row { count } => build_row(count),
            DemoSkeleton::MixedPages => build_mixed_pages(),
            DemoSkeleton::Clipped => build_clipped(),
        }
    }
}

impl DemoRig {
    /// Poses every spinning slot at `time` seconds.
    pub fn pose(&mut self, time: f32) {
        for (i, id) in self.spinning.iter().enumerate() {
            if let Some(slot) = self.skeleton.slot_mut(*id) {
                let translation = slot.bone_transform.translation;
                slot.bone_transform =
                    Affine2::from_angle_translation(time * (1.0 + i as f32 * 0.25), translation);
            }
        }
    }
}

fn add_quad(
    skeleton: &mut Skeleton,
    page: &std::sync::Arc<AtlasPage>,
    blend_mode: BlendMode,
    at: Vec2,
) -> SlotId {
    let name = format!("quad{}", skeleton.slots().len());
    let region = RegionAttachment::centered(&name, page.clone(), Vec2::splat(1.5), Vec2::ZERO, Vec2::ONE);
    let handle = skeleton.add_attachment(Attachment::Region(region));
    let id = skeleton.add_slot(name, blend_mode);
    skeleton.set_attachment(id, Some(handle));
    if let Some(slot) = skeleton.slot_mut(id) {
        slot.bone_transform = Affine2::from_translation(at);
    }
    id
}

fn build_row(count: u32) -> DemoRig {
    let mut skeleton = Skeleton::new();
    let page = AtlasPage::new(0, "atlas/row.png");
    let spinning = (0..count)
        .map(|i| add_quad(&mut skeleton, &page, BlendMode::Normal, Vec2::new(i as f32 * 2.0, 0.0)))
        .collect();

    DemoRig {
        skeleton,
        builder: InstructionBuilder::new(),
        spinning,
    }
}

fn build_mixed_pages() -> DemoRig {
    let mut skeleton = Skeleton::new();
    let body = AtlasPage::new(0, "atlas/body.png");
    let face = AtlasPage::new(1, "atlas/face.png");

    let mut spinning = Vec::new();
    spinning.push(add_quad(&mut skeleton, &body, BlendMode::Normal, Vec2::ZERO));
    spinning.push(add_quad(&mut skeleton, &body, BlendMode::Normal, Vec2::new(2.0, 0.0)));
    spinning.push(add_quad(&mut skeleton, &face, BlendMode::Normal, Vec2::new(0.0, 2.0)));
    let glow = add_quad(&mut skeleton, &face, BlendMode::Additive, Vec2::new(2.0, 2.0));
    spinning.push(glow);
    if let Some(slot) = skeleton.slot_mut(glow) {
        slot.color = Vec4::new(1.0, 0.8, 0.4, 0.75);
    }
    spinning.push(add_quad(&mut skeleton, &body, BlendMode::Normal, Vec2::new(4.0, 0.0)));

    // The last body quad is drawn on its own so it can be layered separately.
    let separator = spinning[4];
    DemoRig {
        skeleton,
        builder: InstructionBuilder::new().with_separators([separator]),
        spinning,
    }
}

fn build_clipped() -> DemoRig {
    let mut skeleton = Skeleton::new();
    let page = AtlasPage::new(0, "atlas/clipped.png");

    let fan_points = 12;
    let mut vertices = vec![Vec2::ZERO];
    let mut uvs = vec![Vec2::splat(0.5)];
    for i in 0..fan_points {
        let angle = i as f32 / fan_points as f32 * std::f32::consts::TAU;
        let dir = Vec2::from_angle(angle);
        vertices.push(dir * 2.0);
        uvs.push(Vec2::splat(0.5) + dir * 0.5);
    }
    let triangles = (0..fan_points as u16)
        .flat_map(|i| [0, i + 1, (i + 1) % fan_points as u16 + 1])
        .collect();

    let mask_slot = skeleton.add_slot("mask", BlendMode::Normal);
    let fan_slot = skeleton.add_slot("fan", BlendMode::Normal);
    let after = add_quad(&mut skeleton, &page, BlendMode::Normal, Vec2::new(3.0, 0.0));

    let mask = ClippingAttachment::new(
        "mask",
        vec![
            Vec2::new(-1.0, -1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, 1.0),
        ],
        Some(fan_slot),
    );
    let mask = skeleton.add_attachment(Attachment::Clipping(mask));
    skeleton.set_attachment(mask_slot, Some(mask));

    let fan = MeshAttachment::new("fan", page, vertices, uvs, triangles);
    let fan = skeleton.add_attachment(Attachment::Mesh(fan));
    skeleton.set_attachment(fan_slot, Some(fan));

    DemoRig {
        skeleton,
        builder: InstructionBuilder::new(),
        spinning: vec![fan_slot, after],
    }
}
