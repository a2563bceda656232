//! Error types for dealer-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
