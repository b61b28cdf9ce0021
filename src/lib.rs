pub mod asset;
pub mod error;
pub mod renderer;
pub mod settings;
pub mod skeleton;

pub use error::{BufferKind, GeneratorError};
pub use renderer::{InstructionBuilder, MeshGenerator, MultiMeshBatcher};
pub use settings::MeshSettings;
pub use skeleton::{BlendMode, Skeleton, SlotId};

/// Installs the `env_logger` backend, honouring `RUST_LOG` and defaulting to
/// `info`. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
