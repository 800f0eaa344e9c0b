//! Intent execution engine.
//!
//! Queries run straight through the session. Trades are validated,
//! proposed at the confirmation gate, and only an authorized action is
//! submitted - with the action id reserved in the tracker before the
//! request goes out, so a retried confirm can never place two orders.

use crate::error::EngineError;
use ibx_core::{Action, ActionDetail, ActionId, Intent, Order, QueryAction, TradeAction};
use ibx_gateway::RequestBody;
use ibx_guard::{validate, ConfirmationGate, ConfirmationTicket};
use ibx_orders::ReserveOutcome;
use ibx_session::Session;
use std::time::Duration;
use tracing::{info, warn};

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Default wait for a terminal order state after submission.
    pub await_terminal_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            await_terminal_timeout_ms: 30000,
        }
    }
}

/// Structured result handed to the response formatter.
#[derive(Debug)]
pub enum Outcome {
    /// Query result payload as returned by the gateway.
    Query(serde_json::Value),
    /// Trade proposed; the user must confirm before submission.
    AwaitingConfirmation(ConfirmationTicket),
    /// Trade submitted and tracked.
    Submitted(Order),
}

/// One engine per session.
#[derive(Clone)]
pub struct Engine {
    session: Session,
    gate: ConfirmationGate,
    config: EngineConfig,
}

impl Engine {
    pub fn new(session: Session, gate: ConfirmationGate, config: EngineConfig) -> Self {
        Self {
            session,
            gate,
            config,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn gate(&self) -> &ConfirmationGate {
        &self.gate
    }

    /// Handle one resolver intent.
    ///
    /// Validation runs against the current account snapshot. A query
    /// executes immediately; a trade stops at the gate.
    pub async fn handle(&self, intent: &Intent) -> Result<Outcome, EngineError> {
        let snapshot = self.session.cache().snapshot();
        let action = validate(intent, &snapshot)?;

        match &action.detail {
            ActionDetail::Query(query) => {
                let body = match query {
                    QueryAction::AccountSummary => RequestBody::AccountSummary,
                    QueryAction::Positions => RequestBody::Positions,
                    QueryAction::AssetInfo { instrument } => RequestBody::AssetInfo {
                        symbol: instrument.symbol.clone(),
                        sec_type: instrument.sec_type,
                    },
                };
                let result = self.session.issue(body).await?;
                Ok(Outcome::Query(result))
            }
            ActionDetail::Trade(_) => {
                let ticket = self.gate.propose(action)?;
                Ok(Outcome::AwaitingConfirmation(ticket))
            }
        }
    }

    /// Confirm a proposed trade and submit it.
    pub async fn confirm(&self, action_id: &ActionId, token: &str) -> Result<Outcome, EngineError> {
        let action = self.gate.confirm(action_id, token)?;
        let order = self.submit(&action).await?;
        Ok(Outcome::Submitted(order))
    }

    /// Decline a proposed trade.
    pub fn decline(&self, action_id: &ActionId) -> Result<(), EngineError> {
        self.gate.decline(action_id)?;
        Ok(())
    }

    /// Submit an authorized action.
    ///
    /// The action id is reserved first: if it already produced an
    /// order, that order is returned instead of submitting again.
    async fn submit(&self, action: &Action) -> Result<Order, EngineError> {
        let Some(trade) = action.as_trade() else {
            // The gate never authorizes a query; this is unreachable
            // through the public API.
            return Err(EngineError::MalformedReply(
                "authorized action is not a trade".to_string(),
            ));
        };

        match self.session.tracker().reserve(&action.id) {
            ReserveOutcome::Reserved => {}
            ReserveOutcome::InFlight => {
                return Err(EngineError::SubmissionInFlight(action.id.clone()))
            }
            ReserveOutcome::Submitted(order_id) => {
                warn!(%action.id, order_id, "Action already submitted, reusing order");
                if let Some(order) = self.session.tracker().get(order_id) {
                    return Ok(order);
                }
                return Err(EngineError::SubmissionInFlight(action.id.clone()));
            }
        }

        let body = place_order_body(action, trade);
        let reply = match self.session.issue(body).await {
            Ok(reply) => reply,
            Err(e) => {
                // Free the action id so a fresh confirm can retry.
                self.session.tracker().release(&action.id);
                return Err(e.into());
            }
        };

        let Some(order_id) = reply.get("orderId").and_then(serde_json::Value::as_u64) else {
            self.session.tracker().release(&action.id);
            return Err(EngineError::MalformedReply(format!(
                "placeOrder reply without orderId: {reply}"
            )));
        };

        let order = self.session.tracker().bind(trade, &action.id, order_id);
        info!(order_id, action_id = %action.id, "Order submitted");
        Ok(order)
    }

    /// Wait for an order to reach a terminal state.
    pub async fn await_terminal(&self, order_id: u64) -> Result<Order, EngineError> {
        let timeout = Duration::from_millis(self.config.await_terminal_timeout_ms);
        Ok(self.session.tracker().await_terminal(order_id, timeout).await?)
    }

    /// Request cancellation of a working order. The cancel is
    /// acknowledged through the normal order-status event flow.
    pub async fn cancel(&self, order_id: u64) -> Result<(), EngineError> {
        self.session
            .issue(RequestBody::CancelOrder { order_id })
            .await?;
        Ok(())
    }
}

fn place_order_body(action: &Action, trade: &TradeAction) -> RequestBody {
    RequestBody::PlaceOrder {
        action_id: action.id.to_string(),
        symbol: trade.instrument.symbol.clone(),
        sec_type: trade.instrument.sec_type,
        side: trade.side,
        quantity: trade.quantity,
        order_type: match trade.mode {
            ibx_core::OrderMode::Market => "market".to_string(),
            ibx_core::OrderMode::Limit(_) => "limit".to_string(),
        },
        limit_price: trade.mode.limit_price().map(|p| p.inner()),
    }
}
