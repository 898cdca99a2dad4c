use crate::morph::MorphMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine configuration, read once at construction and immutable for the
/// life of an engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewsConfig {
    /// Table the SQL stores read and write.
    pub table_name: String,

    /// Applied on the write path when the builder sets no cooldown.
    /// None means "record every visit" by default.
    #[serde(default)]
    pub default_cooldown: Option<Duration>,

    /// Lifetime used by `remember()` when no explicit lifetime is given.
    pub default_cache_lifetime: Duration,

    /// Namespace prefixed to every cache key.
    pub cache_key_prefix: String,

    /// Logical names stored in the `viewable_type` column.
    #[serde(skip)]
    pub morph_map: MorphMap,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            table_name: "views".to_string(),
            default_cooldown: None,
            default_cache_lifetime: Duration::from_secs(3600),
            cache_key_prefix: "viewable".to_string(),
            morph_map: MorphMap::new(),
        }
    }
}

impl ViewsConfig {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset:
    ///
    /// - `VIEWABLE_TABLE_NAME` (default "views")
    /// - `VIEWABLE_DEFAULT_COOLDOWN_SECS` (default unset)
    /// - `VIEWABLE_CACHE_LIFETIME_SECS` (default 3600)
    /// - `VIEWABLE_CACHE_KEY_PREFIX` (default "viewable")
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let table_name =
            std::env::var("VIEWABLE_TABLE_NAME").unwrap_or_else(|_| "views".to_string());

        let default_cooldown = std::env::var("VIEWABLE_DEFAULT_COOLDOWN_SECS")
            .ok()
            .and_then(|v| match v.parse::<u64>() {
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => {
                    tracing::warn!(
                        "Invalid VIEWABLE_DEFAULT_COOLDOWN_SECS '{v}', ignoring"
                    );
                    None
                }
            });

        let default_cache_lifetime = std::env::var("VIEWABLE_CACHE_LIFETIME_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(3600));

        let cache_key_prefix =
            std::env::var("VIEWABLE_CACHE_KEY_PREFIX").unwrap_or_else(|_| "viewable".to_string());

        Self {
            table_name,
            default_cooldown,
            default_cache_lifetime,
            cache_key_prefix,
            morph_map: MorphMap::new(),
        }
    }

    /// Attach a morph map after env construction.
    pub fn with_morph_map(mut self, morph_map: MorphMap) -> Self {
        self.morph_map = morph_map;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_surface() {
        let config = ViewsConfig::default();
        assert_eq!(config.table_name, "views");
        assert_eq!(config.default_cooldown, None);
        assert_eq!(config.default_cache_lifetime, Duration::from_secs(3600));
        assert_eq!(config.cache_key_prefix, "viewable");
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = ViewsConfig {
            default_cooldown: Some(Duration::from_secs(900)),
            ..ViewsConfig::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        let back: ViewsConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(back.table_name, config.table_name);
        assert_eq!(back.default_cooldown, config.default_cooldown);
        assert_eq!(back.default_cache_lifetime, config.default_cache_lifetime);
        assert_eq!(back.cache_key_prefix, config.cache_key_prefix);
    }
}
