//! Account snapshot types.

use crate::decimal::{Price, Qty};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Account-level balances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    pub net_liquidation: Decimal,
    pub total_cash: Decimal,
    pub buying_power: Decimal,
}

/// Position in one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity: Qty,
    pub avg_cost: Price,
}

/// Point-in-time read model of the account.
///
/// Produced by the account cache as an owned copy; mutated only by
/// applying gateway events, never by readers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balances: Balances,
    /// Positions keyed by gateway symbol.
    pub positions: HashMap<String, Position>,
    /// Last-trade prices keyed by gateway symbol, from tick events.
    pub last_prices: HashMap<String, Price>,
}

impl AccountSnapshot {
    /// Held quantity for a symbol (zero when flat).
    pub fn position_qty(&self, symbol: &str) -> Qty {
        self.positions
            .get(symbol)
            .map(|p| p.quantity)
            .unwrap_or(Qty::ZERO)
    }

    /// Last known trade price for a symbol, if any tick has arrived.
    pub fn last_price(&self, symbol: &str) -> Option<Price> {
        self.last_prices.get(symbol).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_position_qty_defaults_to_zero() {
        let snap = AccountSnapshot::default();
        assert_eq!(snap.position_qty("TSLA"), Qty::ZERO);
        assert!(snap.last_price("TSLA").is_none());
    }

    #[test]
    fn test_position_lookup() {
        let mut snap = AccountSnapshot::default();
        snap.positions.insert(
            "TSLA".to_string(),
            Position {
                quantity: Qty::new(dec!(50)),
                avg_cost: Price::new(dec!(200)),
            },
        );
        assert_eq!(snap.position_qty("TSLA"), Qty::new(dec!(50)));
    }
}
