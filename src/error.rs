use thiserror::Error;

/// Destination buffer named in [`GeneratorError::BufferTooSmall`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Positions,
    Uvs,
    Colors,
    Triangles,
    Tangents,
}

impl std::fmt::Display for BufferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BufferKind::Positions => "position",
            BufferKind::Uvs => "uv",
            BufferKind::Colors => "color",
            BufferKind::Triangles => "triangle",
            BufferKind::Tangents => "tangent",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("{buffer} buffer too small: need {required} elements, have {available}")]
    BufferTooSmall {
        buffer: BufferKind,
        required: usize,
        available: usize,
    },
    #[error("submesh index {index} out of range ({count} submeshes)")]
    SubmeshOutOfRange { index: usize, count: usize },
    #[error("invalid mesh settings: {0}")]
    Settings(#[from] serde_json::Error),
}
