//! Order types and the order lifecycle state machine.

use crate::action::ActionId;
use crate::decimal::{Price, Qty};
use crate::instrument::Instrument;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Order pricing mode.
///
/// `Limit` carries its price, so "limit implies a price" holds at the
/// type level rather than by runtime checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "order_type", content = "limit_price")]
pub enum OrderMode {
    Market,
    Limit(Price),
}

impl OrderMode {
    /// Limit price, if this is a limit order.
    pub fn limit_price(&self) -> Option<Price> {
        match self {
            Self::Market => None,
            Self::Limit(p) => Some(*p),
        }
    }
}

impl fmt::Display for OrderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market => write!(f, "market"),
            Self::Limit(p) => write!(f, "limit @ {p}"),
        }
    }
}

/// State of a submitted order.
///
/// Legal transitions:
/// ```text
/// Submitted       -> PartiallyFilled | Filled | Rejected | Cancelled
/// PartiallyFilled -> PartiallyFilled | Filled | Cancelled
/// ```
/// Terminal states admit no further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Accepted by the gateway, working.
    #[default]
    Submitted,
    /// Some quantity filled, remainder working.
    PartiallyFilled,
    /// Fully filled.
    Filled,
    /// Cancel acknowledged; remaining quantity voided.
    Cancelled,
    /// Rejected by the gateway.
    Rejected,
}

impl OrderState {
    /// Returns true if no further transition can occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Rejected)
    }

    /// Returns true if `next` is a legal transition from this state.
    pub fn can_transition_to(&self, next: OrderState) -> bool {
        match self {
            Self::Submitted => matches!(
                next,
                Self::PartiallyFilled | Self::Filled | Self::Rejected | Self::Cancelled
            ),
            Self::PartiallyFilled => {
                matches!(next, Self::PartiallyFilled | Self::Filled | Self::Cancelled)
            }
            Self::Filled | Self::Cancelled | Self::Rejected => false,
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Log spelling matches the wire spelling.
        let s = match self {
            Self::Submitted => "submitted",
            Self::PartiallyFilled => "partially_filled",
            Self::Filled => "filled",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// A submitted order, tracked from creation to a terminal state.
///
/// `order_id` is assigned by the gateway and is authoritative;
/// `action_id` is the local idempotency key that produced it.
/// Immutable once `state` is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Gateway-assigned order id.
    pub order_id: u64,
    /// Local action id (idempotency cross-check).
    pub action_id: ActionId,
    /// Instrument.
    pub instrument: Instrument,
    /// Side.
    pub side: OrderSide,
    /// Requested quantity.
    pub quantity: Qty,
    /// Pricing mode.
    pub mode: OrderMode,
    /// Current state.
    pub state: OrderState,
    /// Cumulative filled quantity.
    pub filled: Qty,
    /// Average fill price, if any quantity has filled.
    pub avg_fill_price: Option<Price>,
    /// Gateway rejection reason, if rejected.
    pub reject_reason: Option<String>,
    /// Submission timestamp (Unix milliseconds).
    pub submitted_at: i64,
}

impl Order {
    /// Remaining unfilled quantity.
    pub fn remaining(&self) -> Qty {
        self.quantity - self.filled
    }
}
