//! End-to-end batching scenarios through the public API.
//!
//! Conventions:
//! - Region quads emit corners bottom-left, bottom-right, top-right, top-left.
//! - Shared-path indices are absolute into the frame's vertex buffer.
//! - Colors default to premultiplied alpha.
//!
use glam::{Affine2, Vec2, Vec3, Vec4};
use skeleton_batcher::renderer::{
    ColorTarget, InstructionBuilder, MeshGenerator, MultiMeshBatcher, VertexBuffers,
};
use skeleton_batcher::skeleton::{
    AtlasPage, Attachment, BlendMode, ClippingAttachment, RegionAttachment, Skeleton, SlotId,
};
use skeleton_batcher::MeshSettings;

fn add_quad(skeleton: &mut Skeleton, page: u32, blend_mode: BlendMode, x: f32, size: f32) -> SlotId {
    let page = AtlasPage::new(page, &format!("page{page}.png"));
    let region = RegionAttachment::centered("quad", page, Vec2::splat(size), Vec2::ZERO, Vec2::ONE);
    let handle = skeleton.add_attachment(Attachment::Region(region));
    let id = skeleton.add_slot(format!("slot{}", skeleton.slots().len()), blend_mode);
    skeleton.set_attachment(id, Some(handle));
    if let Some(slot) = skeleton.slot_mut(id) {
        slot.bone_transform = Affine2::from_translation(Vec2::new(x, 0.0));
    }
    id
}

fn approx_eq2(a: Vec2, b: Vec2, eps: f32) -> bool {
    (a - b).abs().max_element() <= eps
}

#[test]
fn two_quads_share_one_batch() {
    let mut skeleton = Skeleton::new();
    add_quad(&mut skeleton, 0, BlendMode::Normal, 0.0, 2.0);
    add_quad(&mut skeleton, 0, BlendMode::Normal, 4.0, 2.0);

    let mut generator = MeshGenerator::default();
    generator.prepare(&InstructionBuilder::new(), &skeleton);
    generator.generate(&skeleton, true);

    assert_eq!(generator.submesh_count(), 1);
    assert_eq!(generator.vertex_count(), 8);
    assert_eq!(generator.submesh_sizes(), vec![12]);
    assert_eq!(generator.vertex_buffer()[4], Vec3::new(3.0, -1.0, 0.0));
    assert_eq!(generator.uv_buffer()[0], Vec2::new(0.0, 1.0));
}

#[test]
fn additive_slot_under_pma_gets_zero_alpha() {
    let mut skeleton = Skeleton::new();
    add_quad(&mut skeleton, 0, BlendMode::Normal, 0.0, 2.0);
    let glow = add_quad(&mut skeleton, 0, BlendMode::Additive, 4.0, 2.0);
    if let Some(slot) = skeleton.slot_mut(glow) {
        slot.color = Vec4::new(1.0, 0.5, 0.0, 0.5);
    }

    let mut generator = MeshGenerator::default();
    generator.prepare(&InstructionBuilder::new(), &skeleton);
    generator.generate(&skeleton, true);

    let instruction = generator.instruction();
    assert_eq!(instruction.submesh_count(), 2);
    assert!(instruction.submeshes[1].has_pma_additive_slot);
    assert_eq!(instruction.submeshes[1].blend_mode(), BlendMode::Additive);

    let colors = generator.color_buffer();
    assert!(colors[..4].iter().all(|c| *c == Vec4::ONE));
    for color in &colors[4..8] {
        assert_eq!(color.w, 0.0);
        assert!((color.x - 0.5).abs() < 1e-6);
        assert!((color.y - 0.25).abs() < 1e-6);
    }
}

#[test]
fn clip_region_bounds_the_clipped_slot_only() {
    let mut skeleton = Skeleton::new();
    let mask_slot = skeleton.add_slot("mask", BlendMode::Normal);
    let clipped = add_quad(&mut skeleton, 0, BlendMode::Normal, 0.0, 4.0);
    add_quad(&mut skeleton, 0, BlendMode::Normal, 10.0, 2.0);

    let mask = ClippingAttachment::new(
        "mask",
        vec![
            Vec2::new(-1.0, -1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, 1.0),
        ],
        Some(clipped),
    );
    let mask = skeleton.add_attachment(Attachment::Clipping(mask));
    skeleton.set_attachment(mask_slot, Some(mask));

    let mut generator = MeshGenerator::default();
    generator.prepare(&InstructionBuilder::new(), &skeleton);
    generator.generate(&skeleton, true);

    assert!(generator.instruction().submeshes[0].has_clipping);

    let positions = generator.vertex_buffer();
    let vertex_count = positions.len();
    assert!(vertex_count >= 4 + 3);

    let (inside, last_quad) = positions.split_at(vertex_count - 4);
    for position in inside {
        assert!(position.x.abs() <= 1.0 + 1e-4 && position.y.abs() <= 1.0 + 1e-4, "{position:?}");
    }
    assert_eq!(last_quad[0], Vec3::new(9.0, -1.0, 0.0));
    assert_eq!(last_quad[2], Vec3::new(11.0, 1.0, 0.0));

    let triangles = generator.submesh_triangles(0).unwrap_or_default();
    assert_eq!(triangles.len() % 3, 0);
    assert!(triangles.iter().all(|&i| (i as usize) < vertex_count));

    let bounds = generator.bounds();
    assert!(approx_eq2(bounds.min, Vec2::new(-1.0, -1.0), 1e-4));
    assert!(approx_eq2(bounds.max, Vec2::new(11.0, 1.0), 1e-4));
}

#[test]
fn clipping_disabled_keeps_full_quads() {
    let mut skeleton = Skeleton::new();
    let mask_slot = skeleton.add_slot("mask", BlendMode::Normal);
    add_quad(&mut skeleton, 0, BlendMode::Normal, 0.0, 4.0);
    let mask = ClippingAttachment::new("mask", vec![Vec2::ZERO, Vec2::X, Vec2::Y], None);
    let mask = skeleton.add_attachment(Attachment::Clipping(mask));
    skeleton.set_attachment(mask_slot, Some(mask));

    let settings = MeshSettings {
        use_clipping: false,
        ..MeshSettings::default()
    };
    let mut generator = MeshGenerator::new(settings.clone());
    generator.prepare(&InstructionBuilder::new(), &skeleton);
    generator.generate(&skeleton, true);
    assert_eq!(generator.vertex_count(), 4);

    let mut batcher = MultiMeshBatcher::new(settings);
    assert_eq!(batcher.generate(&skeleton).raw_vertex_count(), 4);
}

#[test]
fn separator_cuts_a_same_state_run() {
    let mut skeleton = Skeleton::new();
    add_quad(&mut skeleton, 0, BlendMode::Normal, 0.0, 1.0);
    add_quad(&mut skeleton, 0, BlendMode::Normal, 2.0, 1.0);
    let separator = add_quad(&mut skeleton, 0, BlendMode::Normal, 4.0, 1.0);

    let builder = InstructionBuilder::new().with_separators([separator]);
    let mut generator = MeshGenerator::default();
    generator.prepare(&builder, &skeleton);
    generator.generate(&skeleton, true);

    let submeshes = &generator.instruction().submeshes;
    assert_eq!(submeshes.len(), 2);
    assert_eq!((submeshes[0].start_slot, submeshes[0].end_slot), (0, 2));
    assert!(submeshes[0].force_separate);
    assert_eq!(generator.submesh_triangles(1), Some(&[8, 10, 9, 10, 11, 8][..]));
}

#[test]
fn draw_order_change_is_detected() {
    let mut skeleton = Skeleton::new();
    let a = add_quad(&mut skeleton, 0, BlendMode::Normal, 0.0, 1.0);
    let b = add_quad(&mut skeleton, 0, BlendMode::Normal, 2.0, 1.0);
    let builder = InstructionBuilder::new();

    let mut generator = MeshGenerator::default();
    assert!(generator.prepare(&builder, &skeleton));
    assert!(!generator.prepare(&builder, &skeleton));

    skeleton.set_draw_order(vec![b, a]);
    assert!(generator.prepare(&builder, &skeleton));
    generator.generate(&skeleton, true);
    assert_eq!(generator.vertex_buffer()[0].x, 1.5);
}

#[test]
fn caller_buffers_match_shared_buffers() {
    let mut skeleton = Skeleton::new();
    add_quad(&mut skeleton, 0, BlendMode::Normal, 0.0, 2.0);
    add_quad(&mut skeleton, 1, BlendMode::Normal, 3.0, 2.0);
    let builder = InstructionBuilder::new();

    let mut shared = MeshGenerator::default();
    shared.prepare(&builder, &skeleton);
    shared.generate(&skeleton, true);

    let mut generator = MeshGenerator::default();
    generator.prepare(&builder, &skeleton);
    let instruction = generator.instruction().clone();

    let mut positions = vec![Vec3::ZERO; 8];
    let mut uvs = vec![Vec2::ZERO; 8];
    let mut colors = vec![0u32; 8];
    let mut buffers = VertexBuffers {
        positions: &mut positions,
        uvs: &mut uvs,
        colors: ColorTarget::Packed(&mut colors),
    };
    let written = generator
        .build_mesh_into(&skeleton, &instruction, true, &mut buffers)
        .expect("buffers are large enough");

    assert_eq!(written, 8);
    assert_eq!(positions, shared.vertex_buffer());
    assert_eq!(uvs, shared.uv_buffer());
    assert_eq!(colors, shared.packed_color_buffer());

    let mut triangles = vec![0u32; 12];
    assert_eq!(generator.copy_triangles_into(&mut triangles).ok(), Some(12));
    assert_eq!(&triangles[6..], &[4, 6, 5, 6, 7, 4]);
}

#[test]
fn multi_mesh_splits_by_page() {
    let mut skeleton = Skeleton::new();
    add_quad(&mut skeleton, 0, BlendMode::Normal, 0.0, 1.0);
    add_quad(&mut skeleton, 0, BlendMode::Normal, 2.0, 1.0);
    add_quad(&mut skeleton, 1, BlendMode::Normal, 4.0, 1.0);

    let mut batcher = MultiMeshBatcher::new(MeshSettings::default());
    let multi = batcher.generate(&skeleton);

    assert_eq!(multi.page_indices(), vec![0, 1]);
    assert_eq!(multi.mesh_size(0), Some((8, 12)));
    assert_eq!(multi.mesh_size(1), Some((4, 6)));
    assert_eq!(&*multi.batches()[1].texture_path, "page1.png");
    assert_eq!(multi.batches()[1].indices, vec![0, 2, 1, 2, 3, 0]);
}
