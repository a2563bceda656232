//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<dealer_ws::WsError>),

    #[error("Execution error: {0}")]
    Execution(#[from] dealer_executor::ExecutionError),

    #[error("Adapter already ran; build a new one to restart")]
    AlreadyRan,
}

impl From<dealer_ws::WsError> for AppError {
    fn from(e: dealer_ws::WsError) -> Self {
        Self::WebSocket(Box::new(e))
    }
}

pub type AppResult<T> = Result<T, AppError>;
