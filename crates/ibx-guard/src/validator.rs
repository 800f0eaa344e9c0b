//! Intent validation.
//!
//! Checks run in a fixed order: schema completeness, then semantic
//! plausibility, then account-state feasibility against the supplied
//! snapshot. The first failed check wins; an `Action` is never
//! partially constructed. The feasibility check is advisory - the
//! gateway's own rejection stays authoritative.

use ibx_core::{
    AccountSnapshot, Action, ActionDetail, Instrument, Intent, IntentKind, OrderMode, OrderSide,
    Price, Qty, QueryAction, QueryKind, SecType, TradeAction,
};
use ibx_telemetry::Metrics;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Unknown or unresolvable instrument: {0}")]
    UnknownInstrument(String),

    #[error("Quantity must be positive")]
    NonPositiveQuantity,

    #[error("Limit price must be positive")]
    NonPositiveLimitPrice,

    #[error("Insufficient buying power: need {required}, have {available}")]
    InsufficientBuyingPower {
        required: Decimal,
        available: Decimal,
    },

    #[error("Insufficient position in {symbol}: selling {requested}, holding {held}")]
    InsufficientPosition {
        symbol: String,
        requested: Qty,
        held: Qty,
    },
}

impl ValidationError {
    /// Name of the failing rule, used as a metrics label.
    pub fn rule(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing_field",
            Self::InvalidField { .. } => "invalid_field",
            Self::UnknownInstrument(_) => "unknown_instrument",
            Self::NonPositiveQuantity => "non_positive_quantity",
            Self::NonPositiveLimitPrice => "non_positive_limit_price",
            Self::InsufficientBuyingPower { .. } => "insufficient_buying_power",
            Self::InsufficientPosition { .. } => "insufficient_position",
        }
    }
}

/// Validate an intent against the current account snapshot.
///
/// Queries are classified non-mutating and need no feasibility check
/// beyond instrument resolution. Trades run the full rule chain.
pub fn validate(intent: &Intent, snapshot: &AccountSnapshot) -> Result<Action, ValidationError> {
    let result = match intent.kind {
        IntentKind::Query(QueryKind::AccountSummary) => {
            Ok(Action::new(ActionDetail::Query(QueryAction::AccountSummary)))
        }
        IntentKind::Query(QueryKind::Positions) => {
            Ok(Action::new(ActionDetail::Query(QueryAction::Positions)))
        }
        IntentKind::Query(QueryKind::AssetInfo) => {
            resolve_symbol(intent).map(|instrument| {
                Action::new(ActionDetail::Query(QueryAction::AssetInfo { instrument }))
            })
        }
        IntentKind::Trade => validate_trade(intent, snapshot)
            .map(|trade| Action::new(ActionDetail::Trade(trade))),
    };

    if let Err(e) = &result {
        debug!(rule = e.rule(), %e, "Intent rejected");
        Metrics::validation_rejected(e.rule());
    }
    result
}

fn resolve_symbol(intent: &Intent) -> Result<Instrument, ValidationError> {
    let symbol = intent
        .symbol
        .as_deref()
        .ok_or(ValidationError::MissingField("symbol"))?;
    Instrument::resolve(symbol).map_err(|_| ValidationError::UnknownInstrument(symbol.to_string()))
}

fn validate_trade(
    intent: &Intent,
    snapshot: &AccountSnapshot,
) -> Result<TradeAction, ValidationError> {
    // Schema: required fields present and well-typed.
    let instrument = resolve_symbol(intent)?;
    let side = parse_side(&intent.params)?;
    let quantity = parse_decimal(&intent.params, "quantity")?;
    let mode = parse_mode(&intent.params)?;

    // Semantics.
    if quantity <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveQuantity);
    }
    if let OrderMode::Limit(price) = mode {
        if !price.is_positive() {
            return Err(ValidationError::NonPositiveLimitPrice);
        }
    }
    let quantity = Qty::new(quantity);

    // Feasibility against the snapshot.
    check_feasibility(&instrument, side, quantity, mode, snapshot)?;

    Ok(TradeAction {
        instrument,
        side,
        quantity,
        mode,
    })
}

fn parse_side(params: &serde_json::Map<String, Value>) -> Result<OrderSide, ValidationError> {
    let raw = params
        .get("side")
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingField("side"))?;
    match raw.to_ascii_lowercase().as_str() {
        "buy" => Ok(OrderSide::Buy),
        "sell" => Ok(OrderSide::Sell),
        other => Err(ValidationError::InvalidField {
            field: "side",
            reason: format!("expected buy or sell, got {other:?}"),
        }),
    }
}

fn parse_mode(params: &serde_json::Map<String, Value>) -> Result<OrderMode, ValidationError> {
    let raw = params
        .get("order_type")
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingField("order_type"))?;
    match raw.to_ascii_uppercase().as_str() {
        "MKT" | "MARKET" => Ok(OrderMode::Market),
        "LMT" | "LIMIT" => {
            let price = parse_decimal(params, "limit_price")?;
            Ok(OrderMode::Limit(Price::new(price)))
        }
        other => Err(ValidationError::InvalidField {
            field: "order_type",
            reason: format!("expected market or limit, got {other:?}"),
        }),
    }
}

fn parse_decimal(
    params: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<Decimal, ValidationError> {
    let value = params
        .get(field)
        .ok_or(ValidationError::MissingField(field))?;
    let parsed = match value {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ValidationError::InvalidField {
        field,
        reason: format!("expected a number, got {value}"),
    })
}

/// Best-effort pre-check of what the gateway will enforce for real.
///
/// Buys compare estimated notional against buying power; the estimate
/// uses the limit price, or the last tick for market orders, and
/// passes when no price is known at all. Sells of stock require the
/// position to cover the quantity; forex has no held-position
/// requirement (selling opens a short leg).
fn check_feasibility(
    instrument: &Instrument,
    side: OrderSide,
    quantity: Qty,
    mode: OrderMode,
    snapshot: &AccountSnapshot,
) -> Result<(), ValidationError> {
    match side {
        OrderSide::Buy => {
            let price = mode
                .limit_price()
                .or_else(|| snapshot.last_price(&instrument.symbol));
            let Some(price) = price else {
                return Ok(());
            };
            let required = quantity.notional(price);
            let available = snapshot.balances.buying_power;
            if required > available {
                return Err(ValidationError::InsufficientBuyingPower {
                    required,
                    available,
                });
            }
        }
        OrderSide::Sell => {
            if instrument.sec_type == SecType::Stock {
                let held = snapshot.position_qty(&instrument.symbol);
                if quantity > held {
                    return Err(ValidationError::InsufficientPosition {
                        symbol: instrument.symbol.clone(),
                        requested: quantity,
                        held,
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibx_core::Position;
    use rust_decimal_macros::dec;
    use serde_json::{json, Map};

    fn trade_params(side: &str, qty: i64, order_type: &str, price: Option<i64>) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("side".to_string(), json!(side));
        params.insert("quantity".to_string(), json!(qty));
        params.insert("order_type".to_string(), json!(order_type));
        if let Some(p) = price {
            params.insert("limit_price".to_string(), json!(p));
        }
        params
    }

    fn snapshot_with(symbol: &str, qty: Decimal, buying_power: Decimal) -> AccountSnapshot {
        let mut snap = AccountSnapshot::default();
        snap.balances.buying_power = buying_power;
        if !qty.is_zero() {
            snap.positions.insert(
                symbol.to_string(),
                Position {
                    quantity: Qty::new(qty),
                    avg_cost: Price::new(dec!(100)),
                },
            );
        }
        snap
    }

    #[test]
    fn test_query_needs_no_feasibility() {
        let snap = AccountSnapshot::default();
        let action = validate(&Intent::query(QueryKind::AccountSummary, None), &snap).unwrap();
        assert!(!action.is_mutating());
    }

    #[test]
    fn test_asset_info_requires_symbol() {
        let snap = AccountSnapshot::default();
        let err = validate(&Intent::query(QueryKind::AssetInfo, None), &snap).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("symbol"));

        let action = validate(&Intent::query(QueryKind::AssetInfo, Some("EUR.USD")), &snap).unwrap();
        match action.detail {
            ActionDetail::Query(QueryAction::AssetInfo { instrument }) => {
                assert_eq!(instrument.sec_type, SecType::Forex);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_valid_limit_sell() {
        let snap = snapshot_with("TSLA", dec!(50), dec!(0));
        let intent = Intent::trade("TSLA", trade_params("sell", 50, "limit", Some(250)));

        let action = validate(&intent, &snap).unwrap();
        assert!(action.is_mutating());
        let trade = action.as_trade().unwrap();
        assert_eq!(trade.quantity, Qty::new(dec!(50)));
        assert_eq!(trade.mode, OrderMode::Limit(Price::new(dec!(250))));
    }

    #[test]
    fn test_sell_without_position_rejected() {
        let snap = snapshot_with("TSLA", dec!(0), dec!(100000));
        let intent = Intent::trade("TSLA", trade_params("sell", 50, "limit", Some(250)));

        let err = validate(&intent, &snap).unwrap_err();
        assert!(matches!(err, ValidationError::InsufficientPosition { .. }));
        assert_eq!(err.rule(), "insufficient_position");
    }

    #[test]
    fn test_buy_beyond_buying_power_rejected() {
        let snap = snapshot_with("AAPL", dec!(0), dec!(1000));
        let intent = Intent::trade("AAPL", trade_params("buy", 100, "limit", Some(200)));

        let err = validate(&intent, &snap).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InsufficientBuyingPower { .. }
        ));
    }

    #[test]
    fn test_market_buy_uses_last_tick() {
        let mut snap = snapshot_with("AAPL", dec!(0), dec!(1000));
        snap.last_prices
            .insert("AAPL".to_string(), Price::new(dec!(200)));
        let intent = Intent::trade("AAPL", trade_params("buy", 100, "market", None));
        assert!(validate(&intent, &snap).is_err());

        // Without any price signal, the pre-check passes and the
        // gateway stays authoritative.
        let snap = snapshot_with("AAPL", dec!(0), dec!(1000));
        let intent = Intent::trade("AAPL", trade_params("buy", 100, "market", None));
        assert!(validate(&intent, &snap).is_ok());
    }

    #[test]
    fn test_schema_checks_run_first() {
        let snap = AccountSnapshot::default();

        let mut params = trade_params("sell", 50, "limit", Some(250));
        params.remove("side");
        let err = validate(&Intent::trade("TSLA", params), &snap).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("side"));

        let err = validate(
            &Intent::trade("TSLA", trade_params("hold", 50, "limit", Some(250))),
            &snap,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { field: "side", .. }));

        let err = validate(
            &Intent::trade("TSLA", trade_params("sell", 50, "limit", None)),
            &snap,
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("limit_price"));
    }

    #[test]
    fn test_semantic_checks() {
        let snap = snapshot_with("TSLA", dec!(50), dec!(0));

        let err = validate(
            &Intent::trade("TSLA", trade_params("sell", 0, "limit", Some(250))),
            &snap,
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::NonPositiveQuantity);

        let err = validate(
            &Intent::trade("TSLA", trade_params("sell", 50, "limit", Some(0))),
            &snap,
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::NonPositiveLimitPrice);

        let err = validate(
            &Intent::trade("not a symbol!", trade_params("sell", 50, "market", None)),
            &snap,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::UnknownInstrument(_)));
    }

    #[test]
    fn test_forex_sell_needs_no_position() {
        let snap = AccountSnapshot::default();
        let intent = Intent::trade("EUR.USD", trade_params("sell", 10000, "market", None));
        assert!(validate(&intent, &snap).is_ok());
    }
}
