//! Executor error types.

use dealer_core::{BookSide, CoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Adapter not ready")]
    NotReady,

    #[error("No usable {side} price")]
    PriceUnavailable { side: BookSide },

    #[error("Order rejected: status={status}, body={body}")]
    Request { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Missing API credentials")]
    MissingCredentials,

    #[error("Signing error: {0}")]
    Signing(#[from] CoreError),
}

impl ExecutionError {
    /// True when the request never left the process.
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::Request { .. } | Self::Transport(_))
    }
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;
