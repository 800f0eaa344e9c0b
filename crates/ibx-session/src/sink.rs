//! Frame sink abstraction.
//!
//! The session writes frames through a trait object so tests can run
//! the full request pipeline against a scripted gateway instead of a
//! live socket.

use crate::error::SessionResult;
use ibx_gateway::{ClientFrame, GatewayFrame, LinkEvent, LinkWriteHandle};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Outbound frame sink.
pub trait FrameSink: Send + Sync {
    /// Send one frame.
    fn send(&self, frame: ClientFrame) -> BoxFuture<'_, SessionResult<()>>;

    /// Check if the sink can currently accept frames.
    fn is_ready(&self) -> bool;
}

/// Sink backed by the real gateway link.
pub struct LinkSink {
    handle: LinkWriteHandle,
}

impl LinkSink {
    pub fn new(handle: LinkWriteHandle) -> Self {
        Self { handle }
    }
}

impl FrameSink for LinkSink {
    fn send(&self, frame: ClientFrame) -> BoxFuture<'_, SessionResult<()>> {
        Box::pin(async move { Ok(self.handle.send(frame).await?) })
    }

    fn is_ready(&self) -> bool {
        self.handle.is_ready()
    }
}

/// Scripted responder: maps each sent frame to gateway frames that are
/// pushed back into the session's event channel.
type Responder = Box<dyn Fn(&ClientFrame) -> Vec<GatewayFrame> + Send + Sync>;

/// Mock sink for tests.
///
/// Records every sent frame and, when a responder is installed, feeds
/// the scripted gateway frames back through the event channel exactly
/// as a live link would.
pub struct MockSink {
    sent: parking_lot::Mutex<Vec<ClientFrame>>,
    ready: AtomicBool,
    responder: parking_lot::Mutex<Option<Responder>>,
    event_tx: mpsc::Sender<LinkEvent>,
}

impl MockSink {
    pub fn new(event_tx: mpsc::Sender<LinkEvent>) -> Self {
        Self {
            sent: parking_lot::Mutex::new(Vec::new()),
            ready: AtomicBool::new(true),
            responder: parking_lot::Mutex::new(None),
            event_tx,
        }
    }

    /// Install the scripted gateway.
    pub fn respond_with<F>(&self, responder: F)
    where
        F: Fn(&ClientFrame) -> Vec<GatewayFrame> + Send + Sync + 'static,
    {
        *self.responder.lock() = Some(Box::new(responder));
    }

    /// Stop or resume accepting frames.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Frames sent so far.
    pub fn sent_frames(&self) -> Vec<ClientFrame> {
        self.sent.lock().clone()
    }

    /// Number of frames sent so far.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl FrameSink for MockSink {
    fn send(&self, frame: ClientFrame) -> BoxFuture<'_, SessionResult<()>> {
        Box::pin(async move {
            if !self.ready.load(Ordering::SeqCst) {
                return Err(crate::error::SessionError::NotReady);
            }

            let responses = {
                let responder = self.responder.lock();
                responder.as_ref().map(|r| r(&frame)).unwrap_or_default()
            };
            self.sent.lock().push(frame);

            for response in responses {
                let _ = self.event_tx.send(LinkEvent::Frame(response)).await;
            }
            Ok(())
        })
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
