//! Morph-map registry: logical storage names for viewable types.
//!
//! The `viewable_type` column stores a configurable logical name rather
//! than whatever concrete type name the application uses. The registry is
//! injected through configuration; unmapped names pass through unchanged.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct MorphMap {
    map: HashMap<String, String>,
}

impl MorphMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stored alias for a concrete type name.
    pub fn insert(&mut self, concrete: impl Into<String>, alias: impl Into<String>) {
        self.map.insert(concrete.into(), alias.into());
    }

    /// Builder-style variant of [`MorphMap::insert`].
    pub fn with(mut self, concrete: impl Into<String>, alias: impl Into<String>) -> Self {
        self.insert(concrete, alias);
        self
    }

    /// Resolve the name stored in the `viewable_type` column. Unmapped
    /// types fall back to the concrete name itself.
    pub fn resolve<'a>(&'a self, concrete: &'a str) -> &'a str {
        self.map.get(concrete).map(String::as_str).unwrap_or(concrete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_type_resolves_to_alias() {
        let map = MorphMap::new().with("app::models::Article", "article");
        assert_eq!(map.resolve("app::models::Article"), "article");
    }

    #[test]
    fn unmapped_type_passes_through() {
        let map = MorphMap::new();
        assert_eq!(map.resolve("app::models::Product"), "app::models::Product");
    }
}
