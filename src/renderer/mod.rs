//! Mesh generation for posed skeletons: instruction building, the shared
//! vertex stream with its per-submesh triangle lists, and the per-texture
//! multi-mesh path.

pub mod bounds;
pub mod buffer;
pub mod color;
pub mod instruction;
pub mod instruction_builder;
pub mod mesh_generator;
pub mod multi_mesh;
pub mod tangents;
pub mod triangles;

pub use bounds::MeshBounds;
pub use buffer::GrowableBuffer;
pub use color::{pack_rgba, unpack_rgba, TintBlack, VertexColor};
pub use instruction::{
    InstructionHistory, RenderState, RendererInstruction, SubmeshInstruction, SubmeshShape,
};
pub use instruction_builder::InstructionBuilder;
pub use mesh_generator::{ColorTarget, MeshGenerator, VertexBuffers, VertexSink};
pub use multi_mesh::{
    MeshBatch, MultiMesh, MultiMeshBatcher, MAX_INDICES_PER_MESH, MAX_VERTICES_PER_MESH,
};
pub use tangents::TangentSolver;
pub use triangles::TriangleIndexer;
