//! Application wiring and the interactive loop.
//!
//! Owns the gateway link task, the session dispatch task, and the
//! confirmation sweeper. The interactive loop is a stand-in for the
//! natural-language surface: it accepts resolver-style JSON intents
//! plus `confirm`/`decline` commands, and prints structured results.

use crate::config::AppConfig;
use crate::engine::{Engine, EngineConfig, Outcome};
use crate::error::AppResult;
use ibx_account::AccountCache;
use ibx_core::{ActionId, Intent};
use ibx_gateway::{GatewayLink, LinkEvent};
use ibx_guard::{ConfirmationGate, GateConfig};
use ibx_orders::OrderTracker;
use ibx_session::{LinkSink, Session, SessionConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct Application {
    config: AppConfig,
    engine: Engine,
    link: Arc<GatewayLink>,
    shutdown: CancellationToken,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel::<LinkEvent>(1000);

        let link = Arc::new(GatewayLink::new(config.link_config(), event_tx));
        let sink = Arc::new(LinkSink::new(link.write_handle()));

        let session = Session::new(
            sink,
            AccountCache::new(),
            OrderTracker::new(),
            SessionConfig {
                request_timeout_ms: config.session.request_timeout_ms,
            },
        );

        let gate = ConfirmationGate::new(GateConfig {
            confirm_deadline_ms: config.confirm.deadline_ms,
        });

        let engine = Engine::new(
            session.clone(),
            gate,
            EngineConfig {
                await_terminal_timeout_ms: config.orders.await_terminal_timeout_ms,
            },
        );

        let shutdown = CancellationToken::new();
        session.spawn_dispatch(event_rx, shutdown.clone());
        engine.gate().spawn_sweeper(
            Duration::from_millis(config.confirm.sweep_interval_ms),
            shutdown.clone(),
        );

        Self {
            config,
            engine,
            link,
            shutdown,
        }
    }

    /// Run until EOF, `quit`, or Ctrl-C.
    pub async fn run(&self) -> AppResult<()> {
        info!(url = %self.config.gateway.url(), "Starting gateway link");

        let link = self.link.clone();
        let link_handle = tokio::spawn(async move {
            if let Err(e) = link.run().await {
                error!(?e, "Gateway link terminated");
            }
        });

        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();

        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    info!("Interrupt received");
                    break;
                }
                line = lines.next_line() => {
                    match line? {
                        Some(line) if line.trim() == "quit" || line.trim() == "exit" => break,
                        Some(line) if !line.trim().is_empty() => {
                            self.handle_line(line.trim()).await;
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
            }
        }

        info!("Shutting down");
        self.shutdown.cancel();
        self.link.shutdown();
        let _ = link_handle.await;
        Ok(())
    }

    async fn handle_line(&self, line: &str) {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("confirm") => {
                let (Some(action_id), Some(token)) = (parts.next(), parts.next()) else {
                    println!("usage: confirm <action_id> <token>");
                    return;
                };
                let action_id = ActionId::from_string(action_id.to_string());
                match self.engine.confirm(&action_id, token).await {
                    Ok(Outcome::Submitted(order)) => {
                        println!(
                            "submitted: order {} ({} {} {})",
                            order.order_id, order.side, order.quantity, order.instrument.symbol
                        );
                        self.report_terminal(order.order_id).await;
                    }
                    Ok(other) => warn!(?other, "Unexpected confirm outcome"),
                    Err(e) => println!("error: {e}"),
                }
            }
            Some("decline") => {
                let Some(action_id) = parts.next() else {
                    println!("usage: decline <action_id>");
                    return;
                };
                let action_id = ActionId::from_string(action_id.to_string());
                match self.engine.decline(&action_id) {
                    Ok(()) => println!("declined {action_id}"),
                    Err(e) => println!("error: {e}"),
                }
            }
            Some("cancel") => {
                let Some(order_id) = parts.next().and_then(|s| s.parse::<u64>().ok()) else {
                    println!("usage: cancel <order_id>");
                    return;
                };
                match self.engine.cancel(order_id).await {
                    Ok(()) => println!("cancel requested for order {order_id}"),
                    Err(e) => println!("error: {e}"),
                }
            }
            _ => self.handle_intent(line).await,
        }
    }

    async fn handle_intent(&self, line: &str) {
        let intent: Intent = match serde_json::from_str(line) {
            Ok(intent) => intent,
            Err(e) => {
                println!("error: not a command and not an intent: {e}");
                return;
            }
        };

        match self.engine.handle(&intent).await {
            Ok(Outcome::Query(result)) => {
                println!("{result:#}");
            }
            Ok(Outcome::AwaitingConfirmation(ticket)) => {
                println!(
                    "confirm required: {} (expires {})",
                    ticket.summary, ticket.expires_at
                );
                println!("  confirm {} {}", ticket.action_id, ticket.token);
            }
            Ok(Outcome::Submitted(order)) => {
                // Trades always pass through the gate first.
                warn!(order_id = order.order_id, "Trade submitted without confirmation step");
            }
            Err(e) => println!("error: {e}"),
        }
    }

    async fn report_terminal(&self, order_id: u64) {
        match self.engine.await_terminal(order_id).await {
            Ok(order) => {
                println!(
                    "order {} {}: filled {} @ {}",
                    order.order_id,
                    order.state,
                    order.filled,
                    order
                        .avg_fill_price
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
                if let Some(reason) = order.reject_reason {
                    println!("  reason: {reason}");
                }
            }
            Err(e) => println!("order {order_id} still working: {e}"),
        }
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
