//! Gateway events that mutate local state.
//!
//! Events carry the id of the entity they update: account/position
//! events feed the account cache, order-status events feed the order
//! tracker. Replies are not events; they are correlated by request id
//! in `ibx-session`.

use crate::decimal::{Price, Qty};
use crate::order::OrderState;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account-level balance tags the gateway reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BalanceTag {
    NetLiquidation,
    TotalCash,
    BuyingPower,
}

/// Last-trade tick for an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickEvent {
    pub symbol: String,
    pub last: Price,
}

/// Order status as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusKind {
    Submitted,
    PartialFill,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatusKind {
    /// Target lifecycle state for this status report.
    pub fn target_state(&self) -> OrderState {
        match self {
            Self::Submitted => OrderState::Submitted,
            Self::PartialFill => OrderState::PartiallyFilled,
            Self::Filled => OrderState::Filled,
            Self::Cancelled => OrderState::Cancelled,
            Self::Rejected => OrderState::Rejected,
        }
    }
}

/// Status update for one order, keyed by its gateway-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusEvent {
    pub order_id: u64,
    pub status: OrderStatusKind,
    /// Cumulative filled quantity.
    #[serde(default)]
    pub filled: Option<Qty>,
    /// Average fill price over all fills so far.
    #[serde(default)]
    pub avg_fill_price: Option<Price>,
    /// Rejection reason, present only for rejected orders.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Unsolicited gateway events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "event")]
pub enum GatewayEvent {
    /// Account balance changed.
    Balance { tag: BalanceTag, value: Decimal },
    /// Position changed for one instrument.
    Position {
        symbol: String,
        quantity: Qty,
        avg_cost: Price,
    },
    /// Last-trade tick.
    Tick(TickEvent),
    /// Order status changed.
    OrderStatus(OrderStatusEvent),
}
