//! End-to-end pipeline tests against a scripted gateway.
//!
//! The mock sink plays the gateway's role: every frame the engine
//! sends can be answered with scripted replies and events, delivered
//! through the same channel a live link would use.

use ibx_account::AccountCache;
use ibx_agent::{Engine, EngineConfig, EngineError, Outcome};
use ibx_core::{
    ActionId, BalanceTag, GatewayEvent, Intent, OrderState, OrderStatusEvent, OrderStatusKind,
    Price, Qty, QueryKind,
};
use ibx_gateway::{ClientFrame, GatewayFrame, LinkEvent, ReplyBody, RequestBody};
use ibx_guard::{ConfirmError, ConfirmationGate, ConfirmationTicket, GateConfig};
use ibx_orders::OrderTracker;
use ibx_session::{MockSink, Session, SessionConfig, SessionError};
use rust_decimal_macros::dec;
use serde_json::{json, Map};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct Harness {
    engine: Engine,
    sink: Arc<MockSink>,
    event_tx: mpsc::Sender<LinkEvent>,
    _shutdown: CancellationToken,
}

fn harness() -> Harness {
    let (event_tx, event_rx) = mpsc::channel(64);
    let sink = Arc::new(MockSink::new(event_tx.clone()));
    let session = Session::new(
        sink.clone(),
        AccountCache::new(),
        OrderTracker::new(),
        SessionConfig {
            request_timeout_ms: 200,
        },
    );
    let shutdown = CancellationToken::new();
    session.spawn_dispatch(event_rx, shutdown.clone());

    let gate = ConfirmationGate::new(GateConfig {
        confirm_deadline_ms: 60000,
    });
    let engine = Engine::new(
        session,
        gate,
        EngineConfig {
            await_terminal_timeout_ms: 1000,
        },
    );
    Harness {
        engine,
        sink,
        event_tx,
        _shutdown: shutdown,
    }
}

async fn bring_up(h: &Harness) {
    h.event_tx.send(LinkEvent::Up).await.unwrap();
    tokio::task::yield_now().await;
}

async fn seed_account(h: &Harness, symbol: &str, qty: rust_decimal::Decimal) {
    h.event_tx
        .send(LinkEvent::Frame(GatewayFrame::Event(
            GatewayEvent::Balance {
                tag: BalanceTag::BuyingPower,
                value: dec!(100000),
            },
        )))
        .await
        .unwrap();
    h.event_tx
        .send(LinkEvent::Frame(GatewayFrame::Event(
            GatewayEvent::Position {
                symbol: symbol.to_string(),
                quantity: Qty::new(qty),
                avg_cost: Price::new(dec!(200)),
            },
        )))
        .await
        .unwrap();
    tokio::task::yield_now().await;
}

/// Gateway that acks every placeOrder with a fresh order id.
fn script_order_gateway(sink: &MockSink, first_order_id: u64) {
    let next = std::sync::atomic::AtomicU64::new(first_order_id);
    sink.respond_with(move |frame| match frame {
        ClientFrame::Request { id, body } => match body {
            RequestBody::PlaceOrder { .. } => {
                let order_id = next.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                vec![GatewayFrame::Reply(ReplyBody {
                    id: *id,
                    result: Some(json!({ "orderId": order_id })),
                    error: None,
                })]
            }
            RequestBody::CancelOrder { order_id } => vec![
                GatewayFrame::Reply(ReplyBody {
                    id: *id,
                    result: Some(json!({})),
                    error: None,
                }),
                GatewayFrame::Event(GatewayEvent::OrderStatus(OrderStatusEvent {
                    order_id: *order_id,
                    status: OrderStatusKind::Cancelled,
                    filled: None,
                    avg_fill_price: None,
                    reason: None,
                })),
            ],
            _ => vec![GatewayFrame::Reply(ReplyBody {
                id: *id,
                result: Some(json!({"netLiquidation": "100000"})),
                error: None,
            })],
        },
        _ => vec![],
    });
}

fn sell_intent(symbol: &str, qty: i64) -> Intent {
    let mut params = Map::new();
    params.insert("side".to_string(), json!("sell"));
    params.insert("quantity".to_string(), json!(qty));
    params.insert("order_type".to_string(), json!("limit"));
    params.insert("limit_price".to_string(), json!(250));
    Intent::trade(symbol, params)
}

async fn propose(h: &Harness, intent: &Intent) -> ConfirmationTicket {
    match h.engine.handle(intent).await.unwrap() {
        Outcome::AwaitingConfirmation(ticket) => ticket,
        other => panic!("expected a confirmation ticket, got {other:?}"),
    }
}

fn fill_event(order_id: u64, qty: rust_decimal::Decimal, px: rust_decimal::Decimal) -> LinkEvent {
    LinkEvent::Frame(GatewayFrame::Event(GatewayEvent::OrderStatus(
        OrderStatusEvent {
            order_id,
            status: OrderStatusKind::Filled,
            filled: Some(Qty::new(qty)),
            avg_fill_price: Some(Price::new(px)),
            reason: None,
        },
    )))
}

#[tokio::test]
async fn confirmed_trade_reaches_filled() {
    let h = harness();
    bring_up(&h).await;
    seed_account(&h, "TSLA", dec!(50)).await;
    script_order_gateway(&h.sink, 1001);

    let ticket = propose(&h, &sell_intent("TSLA", 50)).await;
    assert_eq!(ticket.summary, "SELL 50 TSLA limit @ 250");

    let order = match h.engine.confirm(&ticket.action_id, &ticket.token).await.unwrap() {
        Outcome::Submitted(order) => order,
        other => panic!("expected submission, got {other:?}"),
    };
    assert_eq!(order.order_id, 1001);
    assert_eq!(order.state, OrderState::Submitted);

    h.event_tx.send(fill_event(1001, dec!(50), dec!(249.9))).await.unwrap();

    let terminal = h.engine.await_terminal(1001).await.unwrap();
    assert_eq!(terminal.state, OrderState::Filled);
    assert_eq!(terminal.filled, Qty::new(dec!(50)));
    assert_eq!(terminal.avg_fill_price, Some(Price::new(dec!(249.9))));
}

#[tokio::test]
async fn no_submission_without_confirmation() {
    let h = harness();
    bring_up(&h).await;
    seed_account(&h, "TSLA", dec!(50)).await;
    script_order_gateway(&h.sink, 1001);

    let _ticket = propose(&h, &sell_intent("TSLA", 50)).await;

    // Nothing was sent for the trade itself; the gate is holding it.
    assert!(h
        .sink
        .sent_frames()
        .iter()
        .all(|f| !matches!(f, ClientFrame::Request { body: RequestBody::PlaceOrder { .. }, .. })));

    // Wrong token does not release it either.
    let ticket = propose(&h, &sell_intent("TSLA", 50)).await;
    let err = h.engine.confirm(&ticket.action_id, "nope").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Confirmation(ConfirmError::InvalidConfirmation)
    ));
    assert_eq!(h.engine.session().tracker().active_orders().len(), 0);
}

#[tokio::test]
async fn second_confirm_is_already_consumed() {
    let h = harness();
    bring_up(&h).await;
    seed_account(&h, "TSLA", dec!(50)).await;
    script_order_gateway(&h.sink, 2001);

    let ticket = propose(&h, &sell_intent("TSLA", 50)).await;
    h.engine.confirm(&ticket.action_id, &ticket.token).await.unwrap();

    let err = h.engine.confirm(&ticket.action_id, &ticket.token).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Confirmation(ConfirmError::AlreadyConsumed(_))
    ));

    // Exactly one placeOrder went out.
    let placed = h
        .sink
        .sent_frames()
        .iter()
        .filter(|f| matches!(f, ClientFrame::Request { body: RequestBody::PlaceOrder { .. }, .. }))
        .count();
    assert_eq!(placed, 1);
}

#[tokio::test]
async fn validation_failure_creates_no_ticket() {
    let h = harness();
    bring_up(&h).await;
    // Zero position, so the sell fails feasibility.
    seed_account(&h, "TSLA", dec!(0)).await;

    let err = h.engine.handle(&sell_intent("TSLA", 50)).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(h.engine.gate().ticket_count(), 0);
}

#[tokio::test]
async fn query_round_trip() {
    let h = harness();
    bring_up(&h).await;
    script_order_gateway(&h.sink, 1);

    let outcome = h
        .engine
        .handle(&Intent::query(QueryKind::AccountSummary, None))
        .await
        .unwrap();
    match outcome {
        Outcome::Query(result) => assert_eq!(result["netLiquidation"], "100000"),
        other => panic!("expected query result, got {other:?}"),
    }
}

#[tokio::test]
async fn issue_timeout_then_late_reply_is_dropped() {
    let h = harness();
    bring_up(&h).await;
    // Gateway stays silent: the issue times out.
    let err = h
        .engine
        .handle(&Intent::query(QueryKind::Positions, None))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Session(SessionError::Timeout(_))));

    // A straggling reply finds no pending slot and is absorbed.
    let request_id = match &h.sink.sent_frames()[0] {
        ClientFrame::Request { id, .. } => *id,
        other => panic!("unexpected frame: {other:?}"),
    };
    h.event_tx
        .send(LinkEvent::Frame(GatewayFrame::Reply(ReplyBody {
            id: request_id,
            result: Some(json!([])),
            error: None,
        })))
        .await
        .unwrap();
    tokio::task::yield_now().await;

    // The session keeps working afterwards.
    script_order_gateway(&h.sink, 1);
    assert!(h
        .engine
        .handle(&Intent::query(QueryKind::Positions, None))
        .await
        .is_ok());
}

#[tokio::test]
async fn disconnect_degrades_then_recovers() {
    let h = harness();
    bring_up(&h).await;
    seed_account(&h, "TSLA", dec!(50)).await;

    h.event_tx
        .send(LinkEvent::Down {
            reason: "connection lost".to_string(),
        })
        .await
        .unwrap();
    tokio::task::yield_now().await;

    // Degraded: fails fast instead of queueing.
    let err = h
        .engine
        .handle(&Intent::query(QueryKind::Positions, None))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Session(SessionError::NotReady)));

    // Account state survives the disconnect.
    bring_up(&h).await;
    script_order_gateway(&h.sink, 1);
    let ticket = propose(&h, &sell_intent("TSLA", 50)).await;
    assert!(h.engine.confirm(&ticket.action_id, &ticket.token).await.is_ok());
}

#[tokio::test]
async fn failed_submit_releases_the_action_id() {
    let h = harness();
    bring_up(&h).await;
    seed_account(&h, "TSLA", dec!(50)).await;

    // Gateway refuses the order.
    h.sink.respond_with(|frame| match frame {
        ClientFrame::Request { id, body: RequestBody::PlaceOrder { .. } } => {
            vec![GatewayFrame::Reply(ReplyBody {
                id: *id,
                result: None,
                error: Some("pacing violation".to_string()),
            })]
        }
        _ => vec![],
    });

    let ticket = propose(&h, &sell_intent("TSLA", 50)).await;
    let err = h.engine.confirm(&ticket.action_id, &ticket.token).await.unwrap_err();
    assert!(matches!(err, EngineError::Session(SessionError::Gateway(_))));
    assert!(h.engine.session().tracker().active_orders().is_empty());

    // A fresh intent goes through the whole pipeline again.
    script_order_gateway(&h.sink, 3001);
    let ticket = propose(&h, &sell_intent("TSLA", 50)).await;
    let outcome = h.engine.confirm(&ticket.action_id, &ticket.token).await.unwrap();
    assert!(matches!(outcome, Outcome::Submitted(_)));
}

#[tokio::test]
async fn cancel_flows_through_events() {
    let h = harness();
    bring_up(&h).await;
    seed_account(&h, "TSLA", dec!(50)).await;
    script_order_gateway(&h.sink, 4001);

    let ticket = propose(&h, &sell_intent("TSLA", 50)).await;
    let order = match h.engine.confirm(&ticket.action_id, &ticket.token).await.unwrap() {
        Outcome::Submitted(order) => order,
        other => panic!("expected submission, got {other:?}"),
    };

    h.engine.cancel(order.order_id).await.unwrap();
    let terminal = h.engine.await_terminal(order.order_id).await.unwrap();
    assert_eq!(terminal.state, OrderState::Cancelled);
}

#[tokio::test]
async fn unknown_ticket_is_rejected() {
    let h = harness();
    bring_up(&h).await;

    let err = h
        .engine
        .confirm(&ActionId::new(), "token")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Confirmation(ConfirmError::UnknownTicket(_))
    ));
}

#[tokio::test]
async fn await_terminal_timeout_keeps_tracking() {
    let h = harness();
    bring_up(&h).await;
    seed_account(&h, "TSLA", dec!(50)).await;
    script_order_gateway(&h.sink, 5001);

    let ticket = propose(&h, &sell_intent("TSLA", 50)).await;
    let order = match h.engine.confirm(&ticket.action_id, &ticket.token).await.unwrap() {
        Outcome::Submitted(order) => order,
        other => panic!("expected submission, got {other:?}"),
    };

    // No fill arrives inside the wait window.
    let short_wait = h
        .engine
        .session()
        .tracker()
        .await_terminal(order.order_id, std::time::Duration::from_millis(20))
        .await;
    assert!(short_wait.is_err());

    // The order is still live and a later fill lands.
    h.event_tx.send(fill_event(order.order_id, dec!(50), dec!(250))).await.unwrap();
    let terminal = h.engine.await_terminal(order.order_id).await.unwrap();
    assert_eq!(terminal.state, OrderState::Filled);
}
