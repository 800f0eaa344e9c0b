//! Wire frames exchanged with the gateway.
//!
//! Outbound: a handshake, correlated requests, and pings.
//! Inbound: a handshake ack/reject, replies carrying back the request
//! id they answer, unsolicited events carrying the entity id they
//! update, and pongs.

use ibx_core::{GatewayEvent, OrderSide, Qty, SecType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a correlated request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum RequestBody {
    AccountSummary,
    Positions,
    AssetInfo {
        symbol: String,
        sec_type: SecType,
    },
    PlaceOrder {
        /// Local idempotency key; the gateway rejects a duplicate.
        action_id: String,
        symbol: String,
        sec_type: SecType,
        side: OrderSide,
        quantity: Qty,
        order_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        limit_price: Option<Decimal>,
    },
    CancelOrder {
        order_id: u64,
    },
}

impl RequestBody {
    /// Wire name of this request, also used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AccountSummary => "accountSummary",
            Self::Positions => "positions",
            Self::AssetInfo { .. } => "assetInfo",
            Self::PlaceOrder { .. } => "placeOrder",
            Self::CancelOrder { .. } => "cancelOrder",
        }
    }
}

/// Frames the client sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "frame")]
pub enum ClientFrame {
    /// First frame on every (re)connection.
    Handshake { client_id: u32 },
    /// Correlated request; the reply echoes `id`.
    Request { id: u64, body: RequestBody },
    /// Application-level heartbeat.
    Ping,
}

/// Reply payload: result on success, error message on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyBody {
    pub id: u64,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Frames the gateway sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "frame")]
pub enum GatewayFrame {
    /// Handshake accepted; the link is usable.
    HandshakeAck,
    /// Handshake refused (bad auth, duplicate client id). Fatal.
    HandshakeReject { reason: String },
    /// Reply to a correlated request.
    Reply(ReplyBody),
    /// Unsolicited event.
    Event(GatewayEvent),
    /// Application-level heartbeat response.
    Pong,
}
