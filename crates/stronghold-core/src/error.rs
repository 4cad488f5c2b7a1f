//! Core domain errors.

use thiserror::Error;

/// Core domain errors for Stronghold.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Identifier could not be parsed.
    #[error("Invalid identifier '{0}'")]
    InvalidId(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
