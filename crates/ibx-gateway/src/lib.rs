//! Transport link to the brokerage gateway.
//!
//! Owns the single physical WebSocket connection:
//! - Handshake (client id) before the link is usable
//! - Automatic reconnection with capped exponential backoff
//! - Heartbeat monitoring (ping/pong timeout detection)
//! - Channel-based outbound handle, reconnect-safe
//! - Inbound frames and link up/down notices as a `LinkEvent` stream

pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod message;
pub mod write_handle;

pub use connection::{GatewayLink, LinkConfig, LinkEvent, LinkState};
pub use error::{GatewayError, GatewayResult};
pub use message::{ClientFrame, GatewayFrame, ReplyBody, RequestBody};
pub use write_handle::{LinkWriteHandle, SendError};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any gateway connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
