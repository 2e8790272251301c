//! Configuration for the asset index.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{IndexError, Result};

const DEFAULT_MAX_CONCURRENT_DISPATCHES: usize = 16;

/// Configuration for reconciling one theme's assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Prefix of every record id, e.g. `themes/landscape/source`.
    pub namespace: String,

    /// JSON file backing the index (None = in-memory).
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    /// Maximum number of dispatches in flight within one batch.
    #[serde(default = "default_max_concurrent_dispatches")]
    pub max_concurrent_dispatches: usize,

    /// Buffer JSON store writes until the end of each batch.
    #[serde(default)]
    pub deferred_writes: bool,
}

fn default_max_concurrent_dispatches() -> usize {
    DEFAULT_MAX_CONCURRENT_DISPATCHES
}

impl IndexConfig {
    /// Create a new configuration for a namespace.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            store_path: None,
            max_concurrent_dispatches: DEFAULT_MAX_CONCURRENT_DISPATCHES,
            deferred_writes: false,
        }
    }

    /// Create a configuration for a named theme.
    ///
    /// Ids are theme-relative file paths under `themes/<name>`, so the
    /// namespace keeps the `source` directory: `themes/<name>/source`.
    pub fn for_theme(name: &str) -> Self {
        Self::new(format!("themes/{name}/source"))
    }

    /// Persist the index to a JSON file.
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Set the batch concurrency limit.
    pub fn with_max_concurrent_dispatches(mut self, limit: usize) -> Self {
        self.max_concurrent_dispatches = limit;
        self
    }

    /// Write the JSON store once per batch instead of once per event.
    pub fn with_deferred_writes(mut self) -> Self {
        self.deferred_writes = true;
        self
    }

    /// Parse and validate a TOML configuration.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).await?;
        Self::from_toml_str(&content)
    }

    /// Check the configuration for values the reconciler cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(IndexError::Config("namespace must not be empty".to_string()));
        }
        if self.namespace.ends_with('/') {
            return Err(IndexError::Config(format!(
                "namespace must not end with '/': {}",
                self.namespace
            )));
        }
        if self.max_concurrent_dispatches == 0 {
            return Err(IndexError::Config(
                "max_concurrent_dispatches must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_config_creation() {
        let config = IndexConfig::for_theme("landscape")
            .with_store_path("/tmp/assets.json")
            .with_max_concurrent_dispatches(4);

        assert_eq!(config.namespace, "themes/landscape/source");
        assert_eq!(config.store_path, Some(PathBuf::from("/tmp/assets.json")));
        assert_eq!(config.max_concurrent_dispatches, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_defaults() {
        let config = IndexConfig::from_toml_str(r#"namespace = "themes/test""#).unwrap();
        assert_eq!(config, IndexConfig::new("themes/test"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(IndexConfig::new("").validate().is_err());
        assert!(IndexConfig::new("themes/test/").validate().is_err());
        assert!(
            IndexConfig::new("themes/test")
                .with_max_concurrent_dispatches(0)
                .validate()
                .is_err()
        );
        assert!(matches!(
            IndexConfig::from_toml_str("namespace = 3"),
            Err(IndexError::TomlParse(_))
        ));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("assets.toml");
        std::fs::write(
            &path,
            "namespace = \"themes/test\"\nstore_path = \"db/assets.json\"\nmax_concurrent_dispatches = 2\ndeferred_writes = true\n",
        )
        .unwrap();

        let config = IndexConfig::load(&path).await.unwrap();
        assert_eq!(config.store_path, Some(PathBuf::from("db/assets.json")));
        assert_eq!(config.max_concurrent_dispatches, 2);
        assert!(config.deferred_writes);
    }
}
