use serde::{Deserialize, Serialize};
use std::path::Path;

use vitrine_viewer::ModelRegistry;

fn default_title() -> String {
    "Vitrine Configurator".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSection {
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            title: default_title(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSection {
    pub name: String,
    pub path: String,
}

/// Startup configuration: the seed model set and window options.
///
/// Administrative changes at runtime never flow back into the file; a
/// restart always returns to this seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VitrineConfig {
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub models: Vec<ModelSection>,
}

impl VitrineConfig {
    /// The model set shipped with the application.
    pub fn builtin() -> Self {
        let models = [
            ("Chair", "assets/models/chair.glb"),
            ("Lamp", "assets/models/lamp.glb"),
            ("Table", "assets/models/table.glb"),
            ("Vase", "assets/models/vase.glb"),
            ("Figurine", "assets/models/figurine.glb"),
        ];
        Self {
            window: WindowSection::default(),
            models: models
                .into_iter()
                .map(|(name, path)| ModelSection {
                    name: name.to_string(),
                    path: path.to_string(),
                })
                .collect(),
        }
    }

    /// Read `path`, falling back to the built-in seed when the file is
    /// missing, malformed, or lists no models.
    pub fn load_or_default(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                log::info!(
                    "no config at {} ({err}), using the built-in model set",
                    path.display()
                );
                return Self::builtin();
            }
        };
        match toml::from_str::<Self>(&text) {
            Ok(config) if !config.models.is_empty() => config,
            Ok(_) => {
                log::warn!("{} lists no models, using the built-in set", path.display());
                Self::builtin()
            }
            Err(err) => {
                log::warn!(
                    "failed to parse {}: {err}; using the built-in model set",
                    path.display()
                );
                Self::builtin()
            }
        }
    }

    pub fn registry(&self) -> ModelRegistry {
        ModelRegistry::seeded(
            self.models
                .iter()
                .map(|m| (m.name.clone(), m.path.clone())),
        )
    }
}
