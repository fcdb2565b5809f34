//! Connection adapter.
//!
//! Drives one upgraded duplex stream:
//!
//! 1. The connection is admitted by the [`Hub`] and gets its [`Outbox`].
//! 2. A write task drains the outbox onto the stream, pings the peer on a
//!    fixed interval, and gives up once no pong has arrived within the peer
//!    timeout.
//! 3. The calling task runs the read loop, handing each text frame to the
//!    router.
//! 4. When either side ends, the connection's seats are vacated, it is
//!    unregistered (which closes the outbox), and the write task is allowed to
//!    flush and send a close frame.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::ConnectionConfig;
use crate::error::HubError;
use crate::hub::{ConnectionId, Hub, next_connection_id};
use crate::matchmaker::Matchmaker;
use crate::outbox::{self, OutboxReceiver};
use crate::protocol::Envelope;
use crate::router::{self, ConnectionContext};
use crate::transport::{Inbound, Transport, TransportError, TransportReader, TransportWriter};

type WriteTask = JoinHandle<Result<(), TransportError>>;

/// Why the read loop stopped.
enum ReadEnd {
    /// Peer closed the stream cleanly.
    Closed,
    /// Reading failed.
    Failed(TransportError),
    /// The write task finished first.
    Writer(Result<Result<(), TransportError>, tokio::task::JoinError>),
}

/// Serve one connection until it closes. Returns once both loops have
/// exited and the connection has been removed from every session and from
/// the hub.
pub async fn serve<T: Transport>(
    transport: T,
    hub: &Hub,
    matchmaker: &Matchmaker,
    config: ConnectionConfig,
) -> Result<(), HubError> {
    let id = next_connection_id();
    let (outbox, outbox_rx) = outbox::channel(config.outbound_capacity);
    let (mut reader, mut writer) = transport.split();

    if let Err(e) = hub.register(id, outbox.clone()).await {
        let _ = writer.close().await;
        return Err(e);
    }
    tracing::info!(conn = %id, "Connection opened");

    let (ack_tx, ack_rx) = watch::channel(Instant::now());
    let mut write_task: WriteTask = tokio::spawn(write_loop(id, writer, outbox_rx, ack_rx, config));
    let mut ctx = ConnectionContext::new(id, outbox);

    let end = read_loop(&mut reader, &mut ctx, matchmaker, &ack_tx, &mut write_task).await;

    let vacated = matchmaker.disconnect(id).await;
    hub.unregister(id);

    let (read_result, write_result) = match end {
        ReadEnd::Closed => (Ok(()), write_task.await),
        ReadEnd::Failed(e) => (Err(e), write_task.await),
        ReadEnd::Writer(result) => (Ok(()), result),
    };
    let write_result = write_result.unwrap_or_else(|e| Err(TransportError::Io(e.to_string())));

    tracing::info!(
        conn = %id,
        player = ctx.player_id.as_deref().unwrap_or("-"),
        vacated,
        "Connection closed"
    );

    read_result.and(write_result).map_err(HubError::from)
}

async fn read_loop<R: TransportReader>(
    reader: &mut R,
    ctx: &mut ConnectionContext,
    matchmaker: &Matchmaker,
    ack_tx: &watch::Sender<Instant>,
    write_task: &mut WriteTask,
) -> ReadEnd {
    loop {
        tokio::select! {
            frame = reader.recv() => match frame {
                Ok(Some(Inbound::Text(text))) => handle_text(matchmaker, ctx, &text).await,
                Ok(Some(Inbound::Pong)) => {
                    ack_tx.send_replace(Instant::now());
                }
                Ok(None) => return ReadEnd::Closed,
                Err(e) => {
                    tracing::warn!(conn = %ctx.id, "Read error: {e}");
                    return ReadEnd::Failed(e);
                }
            },
            result = &mut *write_task => return ReadEnd::Writer(result),
        }
    }
}

/// Dispatch one frame. Nothing that goes wrong here ends the connection.
async fn handle_text(matchmaker: &Matchmaker, ctx: &mut ConnectionContext, text: &str) {
    let Err(err) = router::dispatch(matchmaker, ctx, text).await else {
        return;
    };

    match &err {
        HubError::MalformedEnvelope(_) => {
            tracing::debug!(conn = %ctx.id, "Dropping malformed message: {err}");
        }
        e if e.is_request_error() => {
            tracing::warn!(conn = %ctx.id, "Error handling message: {err}");
            let reply = Envelope::error(err.game_id(), err.to_string());
            if let Err(e) = ctx.outbox.push(reply) {
                tracing::debug!(conn = %ctx.id, "Could not report error to peer: {e}");
            }
        }
        _ => {
            tracing::warn!(conn = %ctx.id, "Error handling message: {err}");
        }
    }
}

async fn write_loop<W: TransportWriter>(
    id: ConnectionId,
    mut writer: W,
    mut outbox: OutboxReceiver,
    ack: watch::Receiver<Instant>,
    config: ConnectionConfig,
) -> Result<(), TransportError> {
    let mut keepalive = tokio::time::interval_at(
        Instant::now() + config.keepalive_interval,
        config.keepalive_interval,
    );

    loop {
        // Re-read every pass so a fresh pong pushes the deadline out.
        let deadline = *ack.borrow() + config.peer_timeout;

        tokio::select! {
            item = outbox.recv() => {
                let Some(envelope) = item else {
                    // Outbox closed by the hub: everything queued has been sent.
                    let _ = bounded(config.write_timeout, writer.close()).await;
                    return Ok(());
                };
                match envelope.encode() {
                    Ok(text) => {
                        if let Err(e) = bounded(config.write_timeout, writer.send(&text)).await {
                            tracing::warn!(conn = %id, "Write error: {e}");
                            return Err(e);
                        }
                    }
                    Err(e) => tracing::error!(conn = %id, "Failed to encode envelope: {e}"),
                }
            }
            _ = keepalive.tick() => {
                bounded(config.write_timeout, writer.ping()).await?;
            }
            _ = tokio::time::sleep_until(deadline) => {
                let silent = ack.borrow().elapsed();
                if silent >= config.peer_timeout {
                    tracing::info!(conn = %id, ?silent, "Peer stopped answering keepalive");
                    let _ = bounded(config.write_timeout, writer.close()).await;
                    return Err(TransportError::KeepaliveTimeout(config.peer_timeout));
                }
            }
        }
    }
}

async fn bounded<F>(limit: Duration, write: F) -> Result<(), TransportError>
where
    F: Future<Output = Result<(), TransportError>>,
{
    tokio::time::timeout(limit, write)
        .await
        .map_err(|_| TransportError::WriteTimeout(limit))?
}
