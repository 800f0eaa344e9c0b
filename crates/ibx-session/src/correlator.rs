//! Request/reply correlation.
//!
//! Every outbound request registers a pending slot keyed by its id.
//! The reply resolves the slot exactly once: resolution removes the
//! entry atomically, so a timeout racing a late reply can never
//! deliver twice. An id with no slot is a protocol anomaly, not an
//! error.

use crate::error::{SessionError, SessionResult};
use dashmap::DashMap;
use ibx_gateway::ReplyBody;
use ibx_telemetry::Metrics;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, warn};

struct Pending {
    tx: oneshot::Sender<SessionResult<serde_json::Value>>,
    kind: &'static str,
    issued_at: Instant,
}

/// Pending-request table.
#[derive(Default)]
pub struct Correlator {
    pending: DashMap<u64, Pending>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending request. The returned receiver resolves with
    /// the reply payload, or with the error the session fails it with.
    pub fn register(
        &self,
        id: u64,
        kind: &'static str,
    ) -> oneshot::Receiver<SessionResult<serde_json::Value>> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            id,
            Pending {
                tx,
                kind,
                issued_at: Instant::now(),
            },
        );
        rx
    }

    /// Resolve a reply against its pending request.
    ///
    /// Returns false when no request is pending under that id (late
    /// reply after a timeout, or an id we never issued).
    pub fn resolve(&self, reply: ReplyBody) -> bool {
        let Some((id, pending)) = self.pending.remove(&reply.id) else {
            warn!(id = reply.id, "Reply with no pending request");
            Metrics::protocol_anomaly("late_reply");
            return false;
        };

        let latency_ms = pending.issued_at.elapsed().as_secs_f64() * 1000.0;
        Metrics::reply_matched();
        Metrics::request_latency(pending.kind, latency_ms);
        debug!(id, kind = pending.kind, latency_ms, "Reply matched");

        let outcome = match (reply.result, reply.error) {
            (_, Some(error)) => Err(SessionError::Gateway(error)),
            (Some(result), None) => Ok(result),
            (None, None) => Err(SessionError::EmptyReply(id)),
        };

        // Receiver may already be gone if the issuing task was
        // cancelled; that is not an anomaly.
        let _ = pending.tx.send(outcome);
        true
    }

    /// Drop a pending request after its deadline. A reply arriving
    /// later finds no slot and is counted as an anomaly.
    pub fn abandon(&self, id: u64) {
        if let Some((_, pending)) = self.pending.remove(&id) {
            Metrics::request_timeout(pending.kind);
        }
    }

    /// Drop a pending request that never reached the wire. No reply
    /// can ever arrive, so nothing is counted as a timeout.
    pub fn discard(&self, id: u64) {
        self.pending.remove(&id);
    }

    /// Fail every pending request, typically on disconnect or close.
    pub fn fail_all(&self, err: impl Fn() -> SessionError) {
        let ids: Vec<u64> = self.pending.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some((_, pending)) = self.pending.remove(&id) {
                let _ = pending.tx.send(Err(err()));
            }
        }
    }

    /// Number of requests awaiting a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
