use crate::error::ViewerError;

/// One selectable asset: a display name and a locator the asset loader can
/// resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEntry {
    pub name: String,
    pub locator: String,
}

/// Ordered mapping from model name to locator.
///
/// Insertion order is preserved and is the order presented to the UI.
/// Mutation is synchronous and session-only; a restart reseeds the registry.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    entries: Vec<ModelEntry>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the seed registry. Seed entries bypass extension validation so a
    /// config file stays authoritative; administrative adds do not.
    pub fn seeded(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, locator)| ModelEntry { name, locator })
                .collect(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn first_name(&self) -> Option<&str> {
        self.entries.first().map(|e| e.name.as_str())
    }

    pub fn locator(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.locator.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a new entry. Duplicate names are rejected, never overwritten,
    /// and the locator must carry a supported extension.
    pub fn add(&mut self, name: &str, locator: &str) -> Result<(), ViewerError> {
        if self.contains(name) {
            return Err(ViewerError::DuplicateName(name.to_string()));
        }
        if !has_supported_extension(locator) {
            return Err(ViewerError::InvalidAsset(locator.to_string()));
        }
        self.entries.push(ModelEntry {
            name: name.to_string(),
            locator: locator.to_string(),
        });
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<ModelEntry, ViewerError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| ViewerError::UnknownModel(name.to_string()))?;
        Ok(self.entries.remove(index))
    }
}

/// Extension sniffing is the full extent of asset validation here; anything
/// deeper is the loader's problem and surfaces as a load failure.
pub fn has_supported_extension(locator: &str) -> bool {
    let lower = locator.to_ascii_lowercase();
    lower.ends_with(".glb") || lower.ends_with(".gltf")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModelRegistry {
        ModelRegistry::seeded([
            ("Chair".to_string(), "assets/models/chair.glb".to_string()),
            ("Lamp".to_string(), "assets/models/lamp.glb".to_string()),
        ])
    }

    #[test]
    fn names_keep_insertion_order() {
        let mut reg = registry();
        reg.add("Table", "assets/models/table.gltf").unwrap();
        let names: Vec<_> = reg.names().collect();
        assert_eq!(names, ["Chair", "Lamp", "Table"]);
        assert_eq!(reg.first_name(), Some("Chair"));
    }

    #[test]
    fn duplicate_add_is_rejected_without_overwrite() {
        let mut reg = registry();
        let err = reg.add("Chair", "assets/models/other.glb").unwrap_err();
        assert!(matches!(err, ViewerError::DuplicateName(name) if name == "Chair"));
        assert_eq!(reg.locator("Chair"), Some("assets/models/chair.glb"));
    }

    #[test]
    fn add_requires_a_gltf_extension() {
        let mut reg = registry();
        let err = reg.add("Poster", "assets/poster.png").unwrap_err();
        assert!(matches!(err, ViewerError::InvalidAsset(_)));
        assert!(!reg.contains("Poster"));

        // Case-insensitive, both container formats accepted.
        reg.add("Vase", "assets/models/VASE.GLB").unwrap();
        reg.add("Desk", "assets/models/desk.gltf").unwrap();
    }

    #[test]
    fn remove_unknown_name_is_rejected() {
        let mut reg = registry();
        let err = reg.remove("Sofa").unwrap_err();
        assert!(matches!(err, ViewerError::UnknownModel(name) if name == "Sofa"));

        let removed = reg.remove("Lamp").unwrap();
        assert_eq!(removed.locator, "assets/models/lamp.glb");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn name_can_be_reused_after_removal() {
        let mut reg = registry();
        reg.remove("Chair").unwrap();
        reg.add("Chair", "assets/models/chair2.glb").unwrap();
        assert_eq!(reg.locator("Chair"), Some("assets/models/chair2.glb"));
    }
}
