//! Order tracker.
//!
//! DashMap-backed store of live and terminal orders. Each order is
//! held behind a `watch` channel so callers can await its terminal
//! state without polling. The `by_action` index maps action ids to
//! gateway order ids and is reserved BEFORE a submit request goes
//! out, so a retried action can never produce a second order.

use chrono::Utc;
use dashmap::DashMap;
use ibx_core::{ActionId, Order, OrderStatusEvent, TradeAction};
use ibx_telemetry::Metrics;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Unknown order: {0}")]
    UnknownOrder(u64),

    #[error("Timed out waiting for order {0} to reach a terminal state")]
    WaitTimeout(u64),
}

/// Result of reserving an action id before submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Action id is new; the caller owns the submission.
    Reserved,
    /// A submission for this action id is already in flight.
    InFlight,
    /// This action id already produced an order.
    Submitted(u64),
}

/// Shared order store. Clones share the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct OrderTracker {
    /// Orders keyed by gateway order id.
    orders: Arc<DashMap<u64, watch::Sender<Order>>>,
    /// Idempotency index: action id -> order id once bound,
    /// None while a submission is in flight.
    by_action: Arc<DashMap<ActionId, Option<u64>>>,
}

impl OrderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an action id ahead of a submit request.
    ///
    /// Exactly one caller gets `Reserved` for a given action id; every
    /// later call sees `InFlight` or `Submitted` and must not submit.
    pub fn reserve(&self, action_id: &ActionId) -> ReserveOutcome {
        // Entry API makes check-and-insert atomic per key.
        let mut claimed = false;
        let entry = self
            .by_action
            .entry(action_id.clone())
            .or_insert_with(|| {
                claimed = true;
                None
            });
        if claimed {
            return ReserveOutcome::Reserved;
        }
        match *entry {
            Some(order_id) => ReserveOutcome::Submitted(order_id),
            None => ReserveOutcome::InFlight,
        }
    }

    /// Release a reservation after a failed submit. The action id may
    /// be reserved again on retry.
    pub fn release(&self, action_id: &ActionId) {
        // Only release in-flight reservations; a bound order stays.
        self.by_action
            .remove_if(action_id, |_, order_id| order_id.is_none());
    }

    /// Bind a gateway order id to its reserved action and start
    /// tracking the order in `Submitted` state.
    pub fn bind(&self, action: &TradeAction, action_id: &ActionId, order_id: u64) -> Order {
        let order = Order {
            order_id,
            action_id: action_id.clone(),
            instrument: action.instrument.clone(),
            side: action.side,
            quantity: action.quantity,
            mode: action.mode,
            state: ibx_core::OrderState::Submitted,
            filled: ibx_core::Qty::ZERO,
            avg_fill_price: None,
            reject_reason: None,
            submitted_at: Utc::now().timestamp_millis(),
        };

        let (tx, _rx) = watch::channel(order.clone());
        self.orders.insert(order_id, tx);
        self.by_action.insert(action_id.clone(), Some(order_id));

        Metrics::order_submitted(&action.side.to_string());
        info!(order_id, action_id = %action_id, "Order tracked");
        order
    }

    /// Order id previously produced by an action, if any.
    pub fn order_for_action(&self, action_id: &ActionId) -> Option<u64> {
        self.by_action.get(action_id).and_then(|e| *e)
    }

    /// Current view of an order.
    pub fn get(&self, order_id: u64) -> Option<Order> {
        self.orders.get(&order_id).map(|tx| tx.borrow().clone())
    }

    /// All orders that have not reached a terminal state.
    pub fn active_orders(&self) -> Vec<Order> {
        self.orders
            .iter()
            .map(|e| e.value().borrow().clone())
            .filter(|o| !o.state.is_terminal())
            .collect()
    }

    /// Apply one order-status event.
    ///
    /// Unknown order ids and illegal transitions are protocol
    /// anomalies: logged, counted, state unchanged.
    pub fn apply(&self, event: &OrderStatusEvent) {
        let Some(tx) = self.orders.get(&event.order_id) else {
            warn!(order_id = event.order_id, "Status for unknown order");
            Metrics::protocol_anomaly("unknown_order");
            return;
        };

        let next = event.status.target_state();
        let mut terminal = None;

        tx.send_if_modified(|order| {
            if !order.state.can_transition_to(next) {
                warn!(
                    order_id = order.order_id,
                    from = %order.state,
                    to = %next,
                    "Illegal order state transition"
                );
                Metrics::protocol_anomaly("illegal_transition");
                return false;
            }

            order.state = next;
            if let Some(filled) = event.filled {
                order.filled = filled;
            }
            if next == ibx_core::OrderState::Filled {
                // A fill report without a cumulative quantity still
                // means the whole order filled.
                order.filled = order.quantity;
            }
            if let Some(px) = event.avg_fill_price {
                order.avg_fill_price = Some(px);
            }
            if let Some(reason) = &event.reason {
                order.reject_reason = Some(reason.clone());
            }

            debug!(order_id = order.order_id, state = %order.state, "Order updated");
            if next.is_terminal() {
                terminal = Some(next);
            }
            true
        });

        if let Some(state) = terminal {
            Metrics::order_terminal(&state.to_string());
        }
    }

    /// Wait until an order reaches a terminal state, or time out.
    ///
    /// Returns the terminal order. On timeout the order keeps being
    /// tracked; only the wait gives up.
    pub async fn await_terminal(
        &self,
        order_id: u64,
        timeout: Duration,
    ) -> Result<Order, TrackerError> {
        let mut rx = self
            .orders
            .get(&order_id)
            .map(|tx| tx.subscribe())
            .ok_or(TrackerError::UnknownOrder(order_id))?;

        let wait = rx.wait_for(|o| o.state.is_terminal());
        let outcome = match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(order)) => Ok(order.clone()),
            // Sender dropped means the tracker itself went away.
            Ok(Err(_)) => Err(TrackerError::UnknownOrder(order_id)),
            Err(_) => Err(TrackerError::WaitTimeout(order_id)),
        };
        outcome
    }
}
