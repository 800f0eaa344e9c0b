//! Gateway session layer.
//!
//! Owns request/reply correlation, routes unsolicited events to the
//! account cache and order tracker, and tracks the session lifecycle
//! across reconnects. Sits between the transport link (`ibx-gateway`)
//! and the engine.

pub mod correlator;
pub mod error;
pub mod request_id;
pub mod session;
pub mod sink;

pub use correlator::Correlator;
pub use error::{SessionError, SessionResult};
pub use request_id::RequestIdGenerator;
pub use session::{Session, SessionConfig, SessionState};
pub use sink::{BoxFuture, FrameSink, LinkSink, MockSink};
