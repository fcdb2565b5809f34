//! WebSocket glue for the Axum chess server.
//!
//! Adapts an upgraded [`WebSocket`] to the core's transport traits and hands
//! it to the [`Lobby`]. Everything after the upgrade (matchmaking, relaying,
//! keepalive, teardown) lives in `chess-core`.

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use chess_core::Lobby;
use chess_core::transport::{Inbound, Transport, TransportError, TransportReader, TransportWriter};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

/// Drive a single WebSocket connection.
///
/// Called after the Axum upgrade; `socket` is the full-duplex WebSocket.
pub async fn handle_socket(socket: WebSocket, lobby: Lobby) {
    if let Err(e) = lobby.serve(AxumTransport::new(socket)).await {
        tracing::info!("Connection ended: {e}");
    }
}

/// [`Transport`] over an Axum WebSocket.
pub struct AxumTransport {
    socket: WebSocket,
}

impl AxumTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl Transport for AxumTransport {
    type Reader = AxumReader;
    type Writer = AxumWriter;

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (sink, stream) = self.socket.split();
        (AxumReader { stream }, AxumWriter { sink })
    }
}

pub struct AxumReader {
    stream: SplitStream<WebSocket>,
}

impl TransportReader for AxumReader {
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(Inbound::Text(text.to_string()))),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Ok(Some(Inbound::Text(text))),
                    Err(_) => tracing::debug!("Dropping non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Pong(_))) => return Ok(Some(Inbound::Pong)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Pings are answered by the socket itself.
                Some(Ok(Message::Ping(_))) => continue,
                Some(Err(e)) => return Err(TransportError::Io(e.to_string())),
            }
        }
    }
}

pub struct AxumWriter {
    sink: SplitSink<WebSocket, Message>,
}

impl TransportWriter for AxumWriter {
    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text.to_owned().into()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.sink
            .send(Message::Ping(Bytes::new()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        // The peer may already be gone; the close frame is best effort.
        let _ = self.sink.send(Message::Close(None)).await;
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}
