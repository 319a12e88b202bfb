//! Error types for the lexsync_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for lexsync_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed document structure
    #[error("Validation error: {0}")]
    Validation(String),

    /// Registry and class document disagree on a non-empty card id
    #[error("conflicting ids for chunk '{chunk}': registry has '{registry_id}', class supplies '{class_id}'")]
    Conflict {
        chunk: String,
        registry_id: String,
        class_id: String,
    },

    /// External deck/card creation failed
    #[error("Provisioning error: {0}")]
    Provision(String),

    /// Write-or-rename failure while persisting a store
    #[error("Persistence error: {0}")]
    Persist(String),
}
