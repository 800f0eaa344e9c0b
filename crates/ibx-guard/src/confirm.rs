//! Confirmation gate.
//!
//! Per-action state machine: `Proposed -> Authorized` on a matching
//! token within the deadline, otherwise `Discarded` on decline or
//! expiry. Authorization is single-use. Consumed tickets are kept
//! until the sweeper clears them at their deadline, so a second
//! confirm is distinguishable from a ticket that never existed.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use ibx_core::{Action, ActionDetail, ActionId};
use ibx_telemetry::Metrics;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfirmError {
    /// Propose was called with a non-mutating action. Caller bug.
    #[error("Precondition violation: {0}")]
    PreconditionViolation(String),

    #[error("No ticket for action {0}")]
    UnknownTicket(ActionId),

    #[error("Ticket for action {0} has expired")]
    TicketExpired(ActionId),

    #[error("Confirmation token does not match")]
    InvalidConfirmation,

    #[error("Ticket for action {0} was already consumed")]
    AlreadyConsumed(ActionId),
}

/// Gate configuration.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// How long a proposed action stays confirmable.
    pub confirm_deadline_ms: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            confirm_deadline_ms: 60000,
        }
    }
}

/// What the confirmation surface shows the user.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationTicket {
    pub action_id: ActionId,
    /// Single-use token the user must echo back.
    pub token: String,
    /// Human-readable summary of the pending trade.
    pub summary: String,
    pub expires_at: DateTime<Utc>,
}

struct TicketEntry {
    action: Action,
    token: String,
    expires_at: DateTime<Utc>,
    consumed: bool,
}

/// The sole path by which a mutating action reaches submission.
///
/// Clones share the same ticket table.
#[derive(Clone, Default)]
pub struct ConfirmationGate {
    tickets: Arc<DashMap<ActionId, TicketEntry>>,
    config: GateConfig,
}

impl ConfirmationGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            tickets: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Propose a mutating action for confirmation.
    ///
    /// Returns the ticket to surface to the user. Calling this with a
    /// query is a programming error, not a user error.
    pub fn propose(&self, action: Action) -> Result<ConfirmationTicket, ConfirmError> {
        let summary = match &action.detail {
            ActionDetail::Trade(trade) => trade.to_string(),
            ActionDetail::Query(_) => {
                return Err(ConfirmError::PreconditionViolation(
                    "propose() called with a non-mutating action".to_string(),
                ))
            }
        };

        let token = Uuid::new_v4().to_string()[..8].to_string();
        let expires_at =
            Utc::now() + ChronoDuration::milliseconds(self.config.confirm_deadline_ms as i64);
        let ticket = ConfirmationTicket {
            action_id: action.id.clone(),
            token: token.clone(),
            summary,
            expires_at,
        };

        self.tickets.insert(
            action.id.clone(),
            TicketEntry {
                action,
                token,
                expires_at,
                consumed: false,
            },
        );
        Metrics::ticket_outcome("issued");
        info!(action_id = %ticket.action_id, expires_at = %ticket.expires_at, "Confirmation proposed");
        Ok(ticket)
    }

    /// Confirm a proposed action with its token.
    ///
    /// Exactly one confirm per ticket can succeed; the authorized
    /// action is released to the caller for submission.
    pub fn confirm(&self, action_id: &ActionId, token: &str) -> Result<Action, ConfirmError> {
        let mut entry = self
            .tickets
            .get_mut(action_id)
            .ok_or_else(|| ConfirmError::UnknownTicket(action_id.clone()))?;

        if entry.consumed {
            warn!(%action_id, "Confirm on a consumed ticket");
            return Err(ConfirmError::AlreadyConsumed(action_id.clone()));
        }
        if Utc::now() > entry.expires_at {
            Metrics::ticket_outcome("expired");
            return Err(ConfirmError::TicketExpired(action_id.clone()));
        }
        if entry.token != token {
            Metrics::ticket_outcome("rejected");
            return Err(ConfirmError::InvalidConfirmation);
        }

        entry.consumed = true;
        Metrics::ticket_outcome("confirmed");
        info!(%action_id, "Action authorized");
        Ok(entry.action.clone())
    }

    /// Decline a proposed action, discarding its ticket.
    pub fn decline(&self, action_id: &ActionId) -> Result<(), ConfirmError> {
        let (_, entry) = self
            .tickets
            .remove(action_id)
            .ok_or_else(|| ConfirmError::UnknownTicket(action_id.clone()))?;
        if !entry.consumed {
            Metrics::ticket_outcome("declined");
        }
        info!(%action_id, "Action declined");
        Ok(())
    }

    /// Drop every ticket whose deadline has passed.
    pub fn sweep(&self) {
        let now = Utc::now();
        let expired: Vec<ActionId> = self
            .tickets
            .iter()
            .filter(|e| now > e.expires_at)
            .map(|e| e.key().clone())
            .collect();
        for action_id in expired {
            if let Some((_, entry)) = self.tickets.remove(&action_id) {
                if !entry.consumed {
                    Metrics::ticket_outcome("expired");
                    debug!(%action_id, "Unconfirmed ticket expired");
                }
            }
        }
    }

    /// Spawn the periodic expiry sweeper.
    pub fn spawn_sweeper(&self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let gate = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => return,
                    _ = ticker.tick() => gate.sweep(),
                }
            }
        })
    }

    /// Number of tickets currently held, consumed ones included.
    pub fn ticket_count(&self) -> usize {
        self.tickets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibx_core::{Instrument, OrderMode, OrderSide, Price, Qty, QueryAction, TradeAction};
    use rust_decimal_macros::dec;

    fn trade_action() -> Action {
        Action::new(ActionDetail::Trade(TradeAction {
            instrument: Instrument::resolve("TSLA").unwrap(),
            side: OrderSide::Sell,
            quantity: Qty::new(dec!(50)),
            mode: OrderMode::Limit(Price::new(dec!(250))),
        }))
    }

    fn gate() -> ConfirmationGate {
        ConfirmationGate::new(GateConfig {
            confirm_deadline_ms: 60000,
        })
    }

    #[test]
    fn test_propose_rejects_queries() {
        let err = gate()
            .propose(Action::new(ActionDetail::Query(QueryAction::Positions)))
            .unwrap_err();
        assert!(matches!(err, ConfirmError::PreconditionViolation(_)));
    }

    #[test]
    fn test_confirm_happy_path() {
        let gate = gate();
        let action = trade_action();
        let ticket = gate.propose(action.clone()).unwrap();
        assert_eq!(ticket.summary, "SELL 50 TSLA limit @ 250");

        let authorized = gate.confirm(&ticket.action_id, &ticket.token).unwrap();
        assert_eq!(authorized.id, action.id);
    }

    #[test]
    fn test_confirm_is_single_use() {
        let gate = gate();
        let ticket = gate.propose(trade_action()).unwrap();

        gate.confirm(&ticket.action_id, &ticket.token).unwrap();
        let err = gate.confirm(&ticket.action_id, &ticket.token).unwrap_err();
        assert!(matches!(err, ConfirmError::AlreadyConsumed(_)));
    }

    #[test]
    fn test_wrong_token_leaves_ticket_usable() {
        let gate = gate();
        let ticket = gate.propose(trade_action()).unwrap();

        let err = gate.confirm(&ticket.action_id, "wrong").unwrap_err();
        assert_eq!(err, ConfirmError::InvalidConfirmation);

        // The right token still works afterwards.
        assert!(gate.confirm(&ticket.action_id, &ticket.token).is_ok());
    }

    #[test]
    fn test_expired_ticket() {
        let gate = ConfirmationGate::new(GateConfig {
            confirm_deadline_ms: 0,
        });
        let ticket = gate.propose(trade_action()).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        let err = gate.confirm(&ticket.action_id, &ticket.token).unwrap_err();
        assert!(matches!(err, ConfirmError::TicketExpired(_)));

        gate.sweep();
        assert_eq!(gate.ticket_count(), 0);
        // After the sweep the ticket is gone entirely.
        let err = gate.confirm(&ticket.action_id, &ticket.token).unwrap_err();
        assert!(matches!(err, ConfirmError::UnknownTicket(_)));
    }

    #[test]
    fn test_decline_discards() {
        let gate = gate();
        let ticket = gate.propose(trade_action()).unwrap();

        gate.decline(&ticket.action_id).unwrap();
        let err = gate.confirm(&ticket.action_id, &ticket.token).unwrap_err();
        assert!(matches!(err, ConfirmError::UnknownTicket(_)));
        assert!(matches!(
            gate.decline(&ticket.action_id).unwrap_err(),
            ConfirmError::UnknownTicket(_)
        ));
    }
}
