//! Transport abstraction for an already-upgraded duplex connection.
//!
//! The hub never touches sockets directly. The server crate adapts its
//! WebSocket type to these traits, and tests use an in-memory pair.

use std::future::Future;

use thiserror::Error;

/// Errors that can occur during transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// An I/O or protocol-level error.
    #[error("{0}")]
    Io(String),

    /// No pong arrived within the peer timeout.
    #[error("peer did not answer keepalive within {0:?}")]
    KeepaliveTimeout(std::time::Duration),

    /// A single frame write outlasted the write timeout.
    #[error("write did not complete within {0:?}")]
    WriteTimeout(std::time::Duration),
}

/// A frame received from the peer that the hub cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    /// Keepalive acknowledgement.
    Pong,
}

/// Read half of a transport connection.
pub trait TransportReader: Send + 'static {
    /// Receive the next frame.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(&mut self) -> impl Future<Output = Result<Option<Inbound>, TransportError>> + Send;
}

/// Write half of a transport connection.
pub trait TransportWriter: Send + 'static {
    /// Send a text message to the remote peer.
    fn send(&mut self, text: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Send a keepalive probe.
    fn ping(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Send a close frame and shut the write side down.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// A bidirectional transport that can be split into independent read and write
/// halves, so each can be driven by its own task.
pub trait Transport: Send + 'static {
    type Reader: TransportReader;
    type Writer: TransportWriter;

    fn split(self) -> (Self::Reader, Self::Writer);
}
