//! Gateway link error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Handshake refused: {0}")]
    HandshakeRefused(String),

    #[error("Handshake timed out")]
    HandshakeTimeout,

    #[error("Heartbeat timeout")]
    HeartbeatTimeout,

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    /// Fatal errors close the session instead of triggering reconnect.
    /// Auth refusal and duplicate client id fall in this bucket.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::HandshakeRefused(_))
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
