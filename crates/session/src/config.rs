//! Session configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for a [`Session`](crate::Session), loadable from TOML.
///
/// ```
/// use session::SessionConfig;
///
/// let config = SessionConfig::from_toml("bucket_size = 200").unwrap();
/// assert_eq!(config.bucket_size, 200);
/// assert_eq!(config.sync_debounce_ms, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Steps cache bookmark spacing
    pub bucket_size: usize,
    /// Quiet period between a local edit and the sync round trip
    pub sync_debounce_ms: u64,
    pub undo_enabled: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bucket_size: 500,
            sync_debounce_ms: 100,
            undo_enabled: true,
        }
    }
}

impl SessionConfig {
    pub fn from_toml(input: &str) -> anyhow::Result<Self> {
        let config: SessionConfig = toml::from_str(input)?;
        Ok(config)
    }

    pub fn sync_debounce(&self) -> Duration {
        Duration::from_millis(self.sync_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.bucket_size, 500);
        assert_eq!(config.sync_debounce_ms, 100);
        assert!(config.undo_enabled);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SessionConfig::from_toml("sync_debounce_ms = 250\nundo_enabled = false")
            .unwrap();
        assert_eq!(config.bucket_size, 500);
        assert_eq!(config.sync_debounce_ms, 250);
        assert!(!config.undo_enabled);
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        assert!(SessionConfig::from_toml("bukcet_size = 10").is_err());
    }
}
