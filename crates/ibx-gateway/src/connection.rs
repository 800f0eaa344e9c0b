//! Gateway connection manager.
//!
//! Runs the single send/receive loop for the physical connection and
//! handles the lifecycle around it: handshake, heartbeat, reconnection
//! with capped exponential backoff, and graceful shutdown. Nothing is
//! replayed after a reconnect; the gateway resends account and order
//! state on its own.

use crate::error::{GatewayError, GatewayResult};
use crate::heartbeat::Heartbeat;
use crate::message::{ClientFrame, GatewayFrame};
use crate::write_handle::LinkWriteHandle;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type WsWrite = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Link configuration.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Gateway WebSocket URL.
    pub url: String,
    /// Client id presented in the handshake. A duplicate id is
    /// refused by the gateway and is fatal to the session.
    pub client_id: u32,
    /// Maximum reconnection attempts (0 = infinite).
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff.
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    pub reconnect_max_delay_ms: u64,
    /// Heartbeat interval.
    pub heartbeat_interval_ms: u64,
    /// Heartbeat timeout (pong must arrive within this).
    pub heartbeat_timeout_ms: u64,
    /// Handshake ack must arrive within this.
    pub handshake_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            client_id: 1,
            max_reconnect_attempts: 0, // Infinite
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 60000,
            heartbeat_interval_ms: 30000,
            heartbeat_timeout_ms: 10000,
            handshake_timeout_ms: 5000,
        }
    }
}

/// Physical link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    /// Connected and handshaken.
    Ready,
    Reconnecting,
    /// Shut down or fatally refused; no further reconnects.
    Closed,
}

/// Notices delivered to the session alongside inbound frames.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Link connected and handshaken; requests may flow.
    Up,
    /// Link lost; in-flight requests will never be answered.
    Down { reason: String },
    /// Inbound frame from the gateway.
    Frame(GatewayFrame),
}

/// Gateway connection manager.
pub struct GatewayLink {
    config: LinkConfig,
    state: Arc<RwLock<LinkState>>,
    heartbeat: Arc<Heartbeat>,
    event_tx: mpsc::Sender<LinkEvent>,
    outbound_tx: mpsc::Sender<ClientFrame>,
    /// Outbound receiver, consumed by the connection loop.
    outbound_rx: Arc<TokioMutex<mpsc::Receiver<ClientFrame>>>,
    shutdown_token: CancellationToken,
}

impl GatewayLink {
    /// Create a new link. Inbound frames and up/down notices are
    /// delivered on `event_tx`.
    pub fn new(config: LinkConfig, event_tx: mpsc::Sender<LinkEvent>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(100);
        Self {
            heartbeat: Arc::new(Heartbeat::new(
                config.heartbeat_interval_ms,
                config.heartbeat_timeout_ms,
            )),
            config,
            state: Arc::new(RwLock::new(LinkState::Disconnected)),
            event_tx,
            outbound_tx,
            outbound_rx: Arc::new(TokioMutex::new(outbound_rx)),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a write handle for sending frames.
    ///
    /// The handle can be cloned and shared across tasks.
    pub fn write_handle(&self) -> LinkWriteHandle {
        LinkWriteHandle::new(self.outbound_tx.clone(), self.state.clone())
    }

    /// Current link state.
    pub fn state(&self) -> LinkState {
        *self.state.read()
    }

    /// Signal graceful shutdown. The run loop exits promptly.
    pub fn shutdown(&self) {
        info!("Gateway link shutdown requested");
        self.shutdown_token.cancel();
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Connect and run until shutdown or a fatal error.
    pub async fn run(&self) -> GatewayResult<()> {
        let mut attempt = 0u32;

        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting connect loop");
                *self.state.write() = LinkState::Closed;
                return Ok(());
            }

            *self.state.write() = LinkState::Connecting;

            match self.try_connect().await {
                Ok(()) => {
                    info!("Gateway connection closed");
                }
                Err(e) if e.is_fatal() => {
                    error!(?e, "Fatal gateway error, not reconnecting");
                    *self.state.write() = LinkState::Closed;
                    self.notify_down(e.to_string()).await;
                    return Err(e);
                }
                Err(e) => {
                    error!(?e, "Gateway connection error");
                }
            }

            self.notify_down("connection lost".to_string()).await;

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                *self.state.write() = LinkState::Closed;
                return Ok(());
            }

            attempt += 1;
            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                error!(attempt, "Max reconnection attempts reached");
                *self.state.write() = LinkState::Closed;
                return Err(GatewayError::ConnectionFailed(
                    "max reconnection attempts reached".to_string(),
                ));
            }

            *self.state.write() = LinkState::Reconnecting;

            let delay = self.backoff_delay(attempt);
            warn!(attempt, delay_ms = delay.as_millis(), "Reconnecting");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during backoff, exiting");
                    *self.state.write() = LinkState::Closed;
                    return Ok(());
                }
            }
        }
    }

    async fn try_connect(&self) -> GatewayResult<()> {
        info!(url = %self.config.url, "Connecting to gateway");

        let (ws_stream, _response) =
            connect_async_tls_with_config(&self.config.url, None, true, None).await?;
        let (mut write, mut read) = ws_stream.split();

        // Handshake must complete before the link is usable.
        self.handshake(&mut write, &mut read).await?;

        *self.state.write() = LinkState::Ready;
        self.heartbeat.reset();
        info!(client_id = self.config.client_id, "Gateway link ready");
        if self.event_tx.send(LinkEvent::Up).await.is_err() {
            warn!("Event receiver dropped");
        }

        loop {
            let outbound_recv = async { self.outbound_rx.lock().await.recv().await };

            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in connection loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    *self.state.write() = LinkState::Closed;
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_message(&text).await?;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            self.heartbeat.record_pong();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "Gateway closed the connection");
                            return Err(GatewayError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(?e, "Gateway read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("Gateway stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }

                outbound = outbound_recv => {
                    if let Some(frame) = outbound {
                        let json = serde_json::to_string(&frame)?;
                        write.send(Message::Text(json)).await?;
                    }
                }

                _ = self.heartbeat.wait_for_check() => {
                    if self.heartbeat.is_timed_out() {
                        error!("Heartbeat timeout");
                        return Err(GatewayError::HeartbeatTimeout);
                    }
                    if self.heartbeat.should_send_ping() {
                        let json = serde_json::to_string(&ClientFrame::Ping)?;
                        write.send(Message::Text(json)).await?;
                        self.heartbeat.record_ping();
                        debug!("Sent heartbeat ping");
                    }
                }
            }
        }
    }

    /// Send the handshake and wait for the gateway's verdict.
    async fn handshake(&self, write: &mut WsWrite, read: &mut WsRead) -> GatewayResult<()> {
        let hello = ClientFrame::Handshake {
            client_id: self.config.client_id,
        };
        write.send(Message::Text(serde_json::to_string(&hello)?)).await?;

        let deadline = Duration::from_millis(self.config.handshake_timeout_ms);
        let verdict = tokio::time::timeout(deadline, async {
            loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<GatewayFrame>(&text)? {
                            GatewayFrame::HandshakeAck => return Ok(()),
                            GatewayFrame::HandshakeReject { reason } => {
                                return Err(GatewayError::HandshakeRefused(reason));
                            }
                            other => {
                                // Gateway may flush state before the ack.
                                debug!(?other, "Frame before handshake ack, forwarding");
                                let _ = self.event_tx.send(LinkEvent::Frame(other)).await;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        return Err(GatewayError::ConnectionClosed {
                            code: 1006,
                            reason: "stream ended during handshake".to_string(),
                        })
                    }
                }
            }
        })
        .await;

        match verdict {
            Ok(result) => result,
            Err(_) => Err(GatewayError::HandshakeTimeout),
        }
    }

    async fn handle_text_message(&self, text: &str) -> GatewayResult<()> {
        self.heartbeat.record_message();

        let frame: GatewayFrame = serde_json::from_str(text)?;

        if let GatewayFrame::Pong = frame {
            self.heartbeat.record_pong();
            return Ok(());
        }

        if self.event_tx.send(LinkEvent::Frame(frame)).await.is_err() {
            warn!("Event receiver dropped");
        }

        Ok(())
    }

    async fn notify_down(&self, reason: String) {
        let _ = self.event_tx.send(LinkEvent::Down { reason }).await;
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.reconnect_base_delay_ms;
        let max = self.config.reconnect_max_delay_ms;

        // base * 2^(attempt-1), capped
        let exponent = attempt.saturating_sub(1).min(10);
        let delay = base.saturating_mul(1u64 << exponent).min(max);

        // Add jitter (0-1000ms)
        Duration::from_millis(delay + rand_jitter())
    }
}

/// Generate random jitter (0-1000ms).
fn rand_jitter() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as u64
}
