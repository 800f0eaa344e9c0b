//! Session lifecycle and event dispatch.

use crate::correlator::Correlator;
use crate::error::{SessionError, SessionResult};
use crate::request_id::RequestIdGenerator;
use crate::sink::FrameSink;
use ibx_account::AccountCache;
use ibx_core::GatewayEvent;
use ibx_gateway::{ClientFrame, GatewayFrame, LinkEvent, RequestBody};
use ibx_orders::OrderTracker;
use ibx_telemetry::Metrics;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Default reply deadline for correlated requests.
    pub request_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10000,
        }
    }
}

/// Session lifecycle.
///
/// A new session starts `Disconnected` and moves to `Connecting` once
/// its dispatch task is running. `Degraded` means the link dropped and
/// is reconnecting; requests fail fast instead of queuing blind.
/// `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Ready,
    Degraded,
    Closed,
}

/// Gateway session.
///
/// One per gateway connection. Issues correlated requests and routes
/// unsolicited events to the account cache and order tracker. Cheap to
/// clone; clones share all state.
#[derive(Clone)]
pub struct Session {
    ids: Arc<RequestIdGenerator>,
    correlator: Arc<Correlator>,
    sink: Arc<dyn FrameSink>,
    state: Arc<RwLock<SessionState>>,
    cache: AccountCache,
    tracker: OrderTracker,
    config: SessionConfig,
}

impl Session {
    pub fn new(
        sink: Arc<dyn FrameSink>,
        cache: AccountCache,
        tracker: OrderTracker,
        config: SessionConfig,
    ) -> Self {
        Self {
            ids: Arc::new(RequestIdGenerator::new()),
            correlator: Arc::new(Correlator::new()),
            sink,
            state: Arc::new(RwLock::new(SessionState::Disconnected)),
            cache,
            tracker,
            config,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Spawn the dispatch task consuming link events.
    ///
    /// Runs until the channel closes or shutdown is signalled.
    pub fn spawn_dispatch(
        &self,
        mut events: mpsc::Receiver<LinkEvent>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        *self.state.write() = SessionState::Connecting;
        let session = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        info!("Session dispatch shutting down");
                        session.close();
                        return;
                    }
                    event = events.recv() => {
                        let Some(event) = event else {
                            warn!("Link event channel closed");
                            session.close();
                            return;
                        };
                        session.dispatch(event);
                    }
                }
            }
        })
    }

    fn dispatch(&self, event: LinkEvent) {
        match event {
            LinkEvent::Up => {
                info!("Session ready");
                *self.state.write() = SessionState::Ready;
                Metrics::link_up();
            }
            LinkEvent::Down { reason } => {
                warn!(%reason, "Session degraded");
                *self.state.write() = SessionState::Degraded;
                Metrics::link_down();
                Metrics::link_reconnect(&reason);
                // Nothing in flight will ever be answered now.
                self.correlator.fail_all(|| SessionError::ConnectionLost);
            }
            LinkEvent::Frame(frame) => self.dispatch_frame(frame),
        }
    }

    fn dispatch_frame(&self, frame: GatewayFrame) {
        match frame {
            GatewayFrame::Reply(reply) => {
                self.correlator.resolve(reply);
            }
            GatewayFrame::Event(event) => match &event {
                GatewayEvent::OrderStatus(status) => self.tracker.apply(status),
                _ => self.cache.apply(&event),
            },
            // Handshake frames are consumed by the link; seeing one
            // here is harmless.
            GatewayFrame::HandshakeAck
            | GatewayFrame::HandshakeReject { .. }
            | GatewayFrame::Pong => {
                debug!(?frame, "Ignoring link-level frame");
            }
        }
    }

    /// Issue a correlated request and await its reply.
    ///
    /// Fails fast with `NotReady` unless the session is `Ready`. On
    /// timeout the pending slot is removed, so a straggling reply is
    /// counted as an anomaly instead of resolving a stale future.
    pub async fn issue(&self, body: RequestBody) -> SessionResult<serde_json::Value> {
        self.issue_with_timeout(body, Duration::from_millis(self.config.request_timeout_ms))
            .await
    }

    pub async fn issue_with_timeout(
        &self,
        body: RequestBody,
        timeout: Duration,
    ) -> SessionResult<serde_json::Value> {
        match self.state() {
            SessionState::Ready => {}
            SessionState::Closed => return Err(SessionError::Closed),
            _ => return Err(SessionError::NotReady),
        }

        let id = self.ids.next_id();
        let kind = body.kind();
        let rx = self.correlator.register(id, kind);

        if let Err(e) = self.sink.send(ClientFrame::Request { id, body }).await {
            // The frame never reached the wire; this is a send
            // failure, not a timeout.
            self.correlator.discard(id);
            return Err(e);
        }
        Metrics::request_issued(kind);
        debug!(id, kind, "Request issued");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            // Slot dropped without a verdict; only close() does that.
            Ok(Err(_)) => Err(SessionError::Closed),
            Err(_) => {
                self.correlator.abandon(id);
                warn!(id, kind, "Request timed out");
                Err(SessionError::Timeout(id))
            }
        }
    }

    /// Close the session. Terminal; every pending and future request
    /// fails with `Closed`.
    pub fn close(&self) {
        *self.state.write() = SessionState::Closed;
        self.correlator.fail_all(|| SessionError::Closed);
    }

    /// Shared account cache.
    pub fn cache(&self) -> &AccountCache {
        &self.cache
    }

    /// Shared order tracker.
    pub fn tracker(&self) -> &OrderTracker {
        &self.tracker
    }
}
