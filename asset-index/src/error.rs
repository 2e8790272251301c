//! Error types for the asset index.

use thiserror::Error;

/// Result type alias for asset index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors that can occur while reconciling the asset index.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Change type outside create/update/skip/delete.
    #[error("invalid change type: {0}")]
    InvalidChangeType(String),

    /// String is not a valid asset-relative path.
    #[error("invalid asset path: {0:?}")]
    InvalidAssetPath(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The backing store could not serve the request.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parse error.
    #[error("toml parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}
