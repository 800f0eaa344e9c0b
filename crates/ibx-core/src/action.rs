//! Validated, executable actions.
//!
//! An `Action` is only ever produced by the validator in `ibx-guard`;
//! it is never built directly from resolver text. By the time one
//! exists, every required field is present and internally consistent.

use crate::decimal::Qty;
use crate::instrument::Instrument;
use crate::intent::QueryKind;
use crate::order::{OrderMode, OrderSide};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Locally generated action id, used as the idempotency key for
/// submission. Unique per action; a retried intent gets a fresh one.
///
/// Format: `ibx_{timestamp_ms}_{uuid_short}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(String);

impl ActionId {
    /// Create a new unique action id.
    pub fn new() -> Self {
        let ts = chrono::Utc::now().timestamp_millis();
        let uuid_short = &Uuid::new_v4().to_string()[..8];
        Self(format!("ibx_{ts}_{uuid_short}"))
    }

    /// Create from an existing string (for parsing gateway echoes).
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ActionId {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

impl AsRef<str> for ActionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Read-only action derived from a query intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryAction {
    AccountSummary,
    Positions,
    AssetInfo { instrument: Instrument },
}

impl QueryAction {
    pub fn kind(&self) -> QueryKind {
        match self {
            Self::AccountSummary => QueryKind::AccountSummary,
            Self::Positions => QueryKind::Positions,
            Self::AssetInfo { .. } => QueryKind::AssetInfo,
        }
    }
}

/// Mutating action derived from a trade intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeAction {
    pub instrument: Instrument,
    pub side: OrderSide,
    pub quantity: Qty,
    pub mode: OrderMode,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.side.to_string().to_uppercase(),
            self.quantity,
            self.instrument.symbol,
            self.mode
        )
    }
}

/// Action payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionDetail {
    Query(QueryAction),
    Trade(TradeAction),
}

/// A validated, executable action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Idempotency key.
    pub id: ActionId,
    /// What to execute.
    pub detail: ActionDetail,
}

impl Action {
    /// Assemble an action from validated parts. Callers outside the
    /// validator should not construct these from raw input.
    pub fn new(detail: ActionDetail) -> Self {
        Self {
            id: ActionId::new(),
            detail,
        }
    }

    /// True for trades; queries never mutate the account.
    pub fn is_mutating(&self) -> bool {
        matches!(self.detail, ActionDetail::Trade(_))
    }

    /// Trade payload, if this is a trade.
    pub fn as_trade(&self) -> Option<&TradeAction> {
        match &self.detail {
            ActionDetail::Trade(t) => Some(t),
            ActionDetail::Query(_) => None,
        }
    }
}
