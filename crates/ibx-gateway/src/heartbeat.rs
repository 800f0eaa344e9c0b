//! Heartbeat monitoring for the gateway link.
//!
//! Tracks ping/pong timing and message activity to detect a dead
//! connection that TCP has not torn down.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
struct HeartbeatState {
    last_ping: Option<DateTime<Utc>>,
    last_message: DateTime<Utc>,
    waiting_for_pong: bool,
}

/// Heartbeat monitor.
pub struct Heartbeat {
    interval_ms: u64,
    timeout_ms: u64,
    state: Mutex<HeartbeatState>,
}

impl Heartbeat {
    pub fn new(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            interval_ms,
            timeout_ms,
            state: Mutex::new(HeartbeatState {
                last_ping: None,
                last_message: Utc::now(),
                waiting_for_pong: false,
            }),
        }
    }

    /// Reset state (called when a connection is established).
    pub fn reset(&self) {
        let mut st = self.state.lock();
        st.last_ping = None;
        st.last_message = Utc::now();
        st.waiting_for_pong = false;
    }

    /// Record that a ping was sent.
    pub fn record_ping(&self) {
        let mut st = self.state.lock();
        st.last_ping = Some(Utc::now());
        st.waiting_for_pong = true;
    }

    /// Record that a pong was received.
    pub fn record_pong(&self) {
        let mut st = self.state.lock();
        st.waiting_for_pong = false;
        if let Some(ping_time) = st.last_ping {
            let rtt_ms = (Utc::now() - ping_time).num_milliseconds();
            debug!(rtt_ms, "Pong received");
        }
    }

    /// Record that any message was received.
    pub fn record_message(&self) {
        self.state.lock().last_message = Utc::now();
    }

    /// True when a sent ping has gone unanswered past the timeout.
    pub fn is_timed_out(&self) -> bool {
        let st = self.state.lock();
        if !st.waiting_for_pong {
            return false;
        }
        match st.last_ping {
            Some(ping_time) => {
                (Utc::now() - ping_time).num_milliseconds() > self.timeout_ms as i64
            }
            None => false,
        }
    }

    /// True when the link has been quiet long enough to warrant a ping
    /// and no pong is outstanding.
    pub fn should_send_ping(&self) -> bool {
        let st = self.state.lock();
        if st.waiting_for_pong {
            return false;
        }
        (Utc::now() - st.last_message).num_milliseconds() >= self.interval_ms as i64
    }

    /// Sleep until the next heartbeat check.
    pub async fn wait_for_check(&self) {
        tokio::time::sleep(Duration::from_millis(self.interval_ms / 2)).await;
    }
}
