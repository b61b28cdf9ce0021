use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::GeneratorError;

/// Options recognised by the mesh generator and the multi-mesh batcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshSettings {
    #[serde(default = "MeshSettings::default_use_clipping")]
    pub use_clipping: bool,
    #[serde(default)]
    pub z_spacing: f32,
    #[serde(default = "MeshSettings::default_pma_vertex_colors")]
    pub pma_vertex_colors: bool,
    #[serde(default)]
    pub tint_black: bool,
    #[serde(default)]
    pub canvas_group_tint_black: bool,
    #[serde(default)]
    pub calculate_tangents: bool,
    #[serde(default)]
    pub add_normals: bool,
    #[serde(default)]
    pub immutable_triangles: bool,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            use_clipping: Self::default_use_clipping(),
            z_spacing: 0.0,
            pma_vertex_colors: Self::default_pma_vertex_colors(),
            tint_black: false,
            canvas_group_tint_black: false,
            calculate_tangents: false,
            add_normals: false,
            immutable_triangles: false,
        }
    }
}

impl MeshSettings {
    pub fn load() -> Self {
        Self::load_from_path("mesh_settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(settings) => {
                    info!("Loaded mesh settings from {:?}", path);
                    settings
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default mesh settings.",
                        path, err
                    );
                    MeshSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Mesh settings file {:?} not found. Using default settings.",
                    path
                );
                MeshSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default mesh settings.",
                    path, err
                );
                MeshSettings::default()
            }
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, GeneratorError> {
        let settings: MeshSettings = serde_json::from_str(json)?;
        Ok(settings.validate())
    }

    /// Tint-black alpha carries the additive cue only when both flags are set.
    pub fn canvas_group_tint_black_active(&self) -> bool {
        self.tint_black && self.canvas_group_tint_black
    }

    pub(crate) fn validate(mut self) -> Self {
        if !self.z_spacing.is_finite() {
            warn!("z_spacing must be finite. Using 0.0 instead.");
            self.z_spacing = 0.0;
        }

        if self.canvas_group_tint_black && !self.tint_black {
            warn!("canvas_group_tint_black has no effect while tint_black is disabled.");
        }

        self
    }

    const fn default_use_clipping() -> bool {
        true
    }

    const fn default_pma_vertex_colors() -> bool {
        true
    }
}
