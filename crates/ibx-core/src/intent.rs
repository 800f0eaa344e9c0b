//! Structured intents from the external natural-language resolver.
//!
//! An `Intent` is the boundary type: the resolver (an LLM-backed
//! parser, outside this system) maps free text to it. Nothing here
//! assumes how that mapping happened; the validator re-checks every
//! field before an `Action` is constructed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What kind of query an intent is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Account balances and buying power.
    AccountSummary,
    /// Open positions.
    Positions,
    /// Quote and reference data for one instrument.
    AssetInfo,
}

/// Intent classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Read-only request.
    Query(QueryKind),
    /// Account-mutating trade request.
    Trade,
}

impl IntentKind {
    /// Trades mutate the account; queries never do.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Self::Trade)
    }
}

/// A structured request produced by the external resolver.
///
/// Immutable once constructed. `params` carries the resolver's named
/// arguments verbatim; only the validator interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Classification of the request.
    pub kind: IntentKind,
    /// Instrument the request is about, if any.
    #[serde(default)]
    pub symbol: Option<String>,
    /// Named arguments (side, quantity, order_type, limit_price, ...).
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Intent {
    /// Convenience constructor for a query with no parameters.
    pub fn query(kind: QueryKind, symbol: Option<&str>) -> Self {
        Self {
            kind: IntentKind::Query(kind),
            symbol: symbol.map(str::to_string),
            params: Map::new(),
        }
    }

    /// Convenience constructor for a trade intent.
    pub fn trade(symbol: &str, params: Map<String, Value>) -> Self {
        Self {
            kind: IntentKind::Trade,
            symbol: Some(symbol.to_string()),
            params,
        }
    }
}
