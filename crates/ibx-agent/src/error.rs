//! Application and engine error types.

use thiserror::Error;

/// Errors surfaced by the engine to the response formatter.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ibx_guard::ValidationError),

    #[error("Confirmation failed: {0}")]
    Confirmation(#[from] ibx_guard::ConfirmError),

    #[error("Session error: {0}")]
    Session(#[from] ibx_session::SessionError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] ibx_orders::TrackerError),

    /// A submission for this action is already in flight; the caller
    /// must wait for its outcome rather than submit again.
    #[error("Submission already in flight for action {0}")]
    SubmissionInFlight(ibx_core::ActionId),

    /// The gateway's reply did not carry what the request requires.
    #[error("Malformed gateway reply: {0}")]
    MalformedReply(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] ibx_gateway::GatewayError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] ibx_telemetry::TelemetryError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
