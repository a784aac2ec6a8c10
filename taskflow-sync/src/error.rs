//! Transport-level errors.

use taskflow_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid live message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid url '{0}'")]
    InvalidUrl(String),
}

impl From<SyncError> for StoreError {
    fn from(e: SyncError) -> Self {
        StoreError::Backend(e.to_string())
    }
}
