//! Per-connection bounded outbound queue.
//!
//! Sessions and the router push [`Envelope`]s into an [`Outbox`]; the
//! connection's write loop drains the matching [`OutboxReceiver`]. Closing the
//! outbox is terminal: further pushes are refused, the receiver hands out what
//! is already queued and then returns `None`.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::protocol::Envelope;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OutboxError {
    #[error("outbound queue is full")]
    Full,
    #[error("outbound queue is closed")]
    Closed,
}

/// Sending side. Cheap to clone; all clones share the same queue and close
/// flag.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<Envelope>,
    closed: Arc<watch::Sender<bool>>,
}

pub struct OutboxReceiver {
    rx: mpsc::Receiver<Envelope>,
    closed: watch::Receiver<bool>,
}

/// Create a queue holding at most `capacity` pending envelopes.
pub fn channel(capacity: usize) -> (Outbox, OutboxReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let (closed_tx, closed_rx) = watch::channel(false);
    (
        Outbox {
            tx,
            closed: Arc::new(closed_tx),
        },
        OutboxReceiver {
            rx,
            closed: closed_rx,
        },
    )
}

impl Outbox {
    /// Queue an envelope without waiting.
    pub fn push(&self, envelope: Envelope) -> Result<(), OutboxError> {
        if self.is_closed() {
            return Err(OutboxError::Closed);
        }
        self.tx.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => OutboxError::Full,
            mpsc::error::TrySendError::Closed(_) => OutboxError::Closed,
        })
    }

    /// Mark the queue closed. Idempotent.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow() || self.tx.is_closed()
    }
}

impl OutboxReceiver {
    /// Wait for the next envelope.
    ///
    /// Returns `None` once the outbox is closed and drained, or once every
    /// [`Outbox`] handle has been dropped.
    pub async fn recv(&mut self) -> Option<Envelope> {
        tokio::select! {
            biased;
            item = self.rx.recv() => item,
            _ = self.closed.wait_for(|closed| *closed) => self.rx.try_recv().ok(),
        }
    }

    /// Take the next queued envelope if one is ready.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }
}
