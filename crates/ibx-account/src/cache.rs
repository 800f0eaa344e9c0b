//! Account cache fed by gateway events.

use chrono::{DateTime, Utc};
use ibx_core::{AccountSnapshot, BalanceTag, GatewayEvent, Position};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Shared account state.
///
/// Writers apply gateway events; readers take an owned snapshot.
/// Clones share the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct AccountCache {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    snapshot: AccountSnapshot,
    last_update: Option<DateTime<Utc>>,
}

impl AccountCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one gateway event. Order-status events are not account
    /// state and are ignored here; the order tracker owns those.
    pub fn apply(&self, event: &GatewayEvent) {
        let mut inner = self.inner.write();

        match event {
            GatewayEvent::Balance { tag, value } => {
                let balances = &mut inner.snapshot.balances;
                match tag {
                    BalanceTag::NetLiquidation => balances.net_liquidation = *value,
                    BalanceTag::TotalCash => balances.total_cash = *value,
                    BalanceTag::BuyingPower => balances.buying_power = *value,
                }
                debug!(?tag, %value, "Balance updated");
            }
            GatewayEvent::Position {
                symbol,
                quantity,
                avg_cost,
            } => {
                if quantity.is_zero() {
                    // Flat position; drop the entry entirely.
                    inner.snapshot.positions.remove(symbol);
                    debug!(%symbol, "Position closed");
                } else {
                    inner.snapshot.positions.insert(
                        symbol.clone(),
                        Position {
                            quantity: *quantity,
                            avg_cost: *avg_cost,
                        },
                    );
                    debug!(%symbol, %quantity, "Position updated");
                }
            }
            GatewayEvent::Tick(tick) => {
                inner
                    .snapshot
                    .last_prices
                    .insert(tick.symbol.clone(), tick.last);
            }
            GatewayEvent::OrderStatus(_) => return,
        }

        inner.last_update = Some(Utc::now());
    }

    /// Owned copy of the current state.
    pub fn snapshot(&self) -> AccountSnapshot {
        self.inner.read().snapshot.clone()
    }

    /// When the cache last absorbed an account event, if ever.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.inner.read().last_update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibx_core::{Price, Qty, TickEvent};
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_updates() {
        let cache = AccountCache::new();
        cache.apply(&GatewayEvent::Balance {
            tag: BalanceTag::BuyingPower,
            value: dec!(25000),
        });
        cache.apply(&GatewayEvent::Balance {
            tag: BalanceTag::NetLiquidation,
            value: dec!(100000),
        });

        let snap = cache.snapshot();
        assert_eq!(snap.balances.buying_power, dec!(25000));
        assert_eq!(snap.balances.net_liquidation, dec!(100000));
        assert!(cache.last_update().is_some());
    }

    #[test]
    fn test_position_upsert_and_close() {
        let cache = AccountCache::new();
        cache.apply(&GatewayEvent::Position {
            symbol: "TSLA".to_string(),
            quantity: Qty::new(dec!(50)),
            avg_cost: Price::new(dec!(210)),
        });
        assert_eq!(cache.snapshot().position_qty("TSLA"), Qty::new(dec!(50)));

        // Zero quantity removes the entry.
        cache.apply(&GatewayEvent::Position {
            symbol: "TSLA".to_string(),
            quantity: Qty::ZERO,
            avg_cost: Price::ZERO,
        });
        assert!(cache.snapshot().positions.is_empty());
    }

    #[test]
    fn test_tick_updates_last_price() {
        let cache = AccountCache::new();
        cache.apply(&GatewayEvent::Tick(TickEvent {
            symbol: "AAPL".to_string(),
            last: Price::new(dec!(187.5)),
        }));
        assert_eq!(
            cache.snapshot().last_price("AAPL"),
            Some(Price::new(dec!(187.5)))
        );
    }

    #[test]
    fn test_order_status_ignored() {
        let cache = AccountCache::new();
        cache.apply(&GatewayEvent::OrderStatus(ibx_core::OrderStatusEvent {
            order_id: 1,
            status: ibx_core::OrderStatusKind::Filled,
            filled: None,
            avg_fill_price: None,
            reason: None,
        }));
        assert!(cache.last_update().is_none());
        assert_eq!(cache.snapshot(), AccountSnapshot::default());
    }
}
