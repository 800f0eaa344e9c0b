//! Outbound write handle for the gateway link.
//!
//! Channel-based, clone-able, reconnect-safe: the handle survives
//! reconnects because it only talks to the link's outbound queue.

use crate::connection::LinkState;
use crate::message::ClientFrame;
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Error type for outbound sends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// Link is not connected and handshaken.
    #[error("link not ready")]
    NotReady,
    /// Outbound channel closed (link shut down).
    #[error("channel closed")]
    ChannelClosed,
}

/// Write handle for sending frames to the gateway.
///
/// Sends are fire-and-forget: success means the frame was queued for
/// the link's single write loop. Reply correlation happens in the
/// session layer.
#[derive(Clone)]
pub struct LinkWriteHandle {
    tx: mpsc::Sender<ClientFrame>,
    state: Arc<RwLock<LinkState>>,
}

impl LinkWriteHandle {
    pub(crate) fn new(tx: mpsc::Sender<ClientFrame>, state: Arc<RwLock<LinkState>>) -> Self {
        Self { tx, state }
    }

    /// Queue a frame for sending.
    pub async fn send(&self, frame: ClientFrame) -> Result<(), SendError> {
        if !self.is_ready() {
            return Err(SendError::NotReady);
        }
        self.tx.send(frame).await.map_err(|_| SendError::ChannelClosed)?;
        debug!("Frame queued for sending");
        Ok(())
    }

    /// True when the link is connected, handshaken, and the channel is
    /// open.
    pub fn is_ready(&self) -> bool {
        *self.state.read() == LinkState::Ready && !self.tx.is_closed()
    }

    /// Current link state.
    pub fn link_state(&self) -> LinkState {
        *self.state.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RequestBody;

    fn handle_with_state(state: LinkState) -> (LinkWriteHandle, mpsc::Receiver<ClientFrame>) {
        let (tx, rx) = mpsc::channel(16);
        let state = Arc::new(RwLock::new(state));
        (LinkWriteHandle::new(tx, state), rx)
    }

    #[tokio::test]
    async fn test_send_when_ready() {
        let (handle, mut rx) = handle_with_state(LinkState::Ready);
        handle
            .send(ClientFrame::Request {
                id: 1,
                body: RequestBody::Positions,
            })
            .await
            .unwrap();
        let frame = rx.recv().await.unwrap();
        assert!(matches!(frame, ClientFrame::Request { id: 1, .. }));
    }

    #[tokio::test]
    async fn test_send_not_ready() {
        let (handle, _rx) = handle_with_state(LinkState::Reconnecting);
        let err = handle.send(ClientFrame::Ping).await.unwrap_err();
        assert_eq!(err, SendError::NotReady);
    }

    #[tokio::test]
    async fn test_send_channel_closed() {
        let (handle, rx) = handle_with_state(LinkState::Ready);
        drop(rx);
        let err = handle.send(ClientFrame::Ping).await.unwrap_err();
        // a dropped receiver reports NotReady via is_closed
        assert!(matches!(
            err,
            SendError::NotReady | SendError::ChannelClosed
        ));
    }
}
