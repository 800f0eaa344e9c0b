//! Session error types.

use ibx_gateway::SendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Session is not `Ready`; the caller should retry later rather
    /// than queue blind.
    #[error("Session is not ready")]
    NotReady,

    /// No reply arrived within the deadline. The request may still
    /// have taken effect on the gateway side.
    #[error("Request {0} timed out")]
    Timeout(u64),

    /// Connection dropped while the request was in flight.
    #[error("Connection lost before a reply arrived")]
    ConnectionLost,

    /// Session was closed.
    #[error("Session closed")]
    Closed,

    /// The gateway answered with an error reply.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// The reply carried neither result nor error.
    #[error("Reply to request {0} carried no payload")]
    EmptyReply(u64),

    #[error("Send failed: {0}")]
    Send(#[from] SendError),
}

pub type SessionResult<T> = Result<T, SessionError>;
