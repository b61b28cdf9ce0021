mod demo_skeletons;

use demo_skeletons::DemoSkeleton;
use log::info;
use skeleton_batcher::renderer::{MeshGenerator, MultiMeshBatcher};
use skeleton_batcher::MeshSettings;

const DEMOS: [DemoSkeleton; 3] = [
    DemoSkeleton::Row { count: 6 },
    DemoSkeleton::MixedPages,
    DemoSkeleton::Clipped,
];

const FRAMES: u32 = 3;

fn run_demo(demo: DemoSkeleton, settings: &MeshSettings) {
    let mut rig = demo.build();
    let mut generator = MeshGenerator::new(settings.clone());
    let mut batcher = MultiMeshBatcher::new(settings.clone());

    for frame in 0..FRAMES {
        rig.pose(frame as f32 / 30.0);

        let topology_changed = generator.prepare(&rig.builder, &rig.skeleton);
        let update_triangles = topology_changed || !generator.instruction().immutable_triangles;
        generator.generate(&rig.skeleton, update_triangles);

        let bounds = generator.bounds();
        info!(
            "{:?} frame {}: {} vertices, submeshes {:?}, bounds {:?}..{:?}{}",
            demo,
            frame,
            generator.vertex_count(),
            generator.submesh_sizes(),
            bounds.min,
            bounds.max,
            if topology_changed { " (rebuilt)" } else { "" }
        );
    }

    let multi = batcher.generate(&rig.skeleton);
    for (i, batch) in multi.batches().iter().enumerate() {
        info!(
            "{:?} mesh {}: page {} ({}) {:?}, {} vertices, {} indices",
            demo,
            i,
            batch.page_index,
            batch.texture_path,
            batch.blend_mode,
            batch.vertex_count(),
            batch.index_count()
        );
    }
}

fn main() {
    skeleton_batcher::init_logging();
    info!("Starting skeleton batcher demo");

    let settings = MeshSettings::load();
    for demo in DEMOS {
        run_demo(demo, &settings);
    }

    info!("Demo complete");
}
