//! TCP server: accept loop and per-connection tasks.
//!
//! This module is responsible for:
//!
//! 1. Accepting incoming TCP connections from game clients.
//! 2. Opening a session for each one through the [`Coordinator`].
//! 3. Running two tasks per connection:
//!    - **Read loop**: reads length-prefixed frames from the socket and hands
//!      each body to [`Coordinator::on_frame`], one at a time.
//!    - **Send loop**: sleeps until the session's outbound queue is signalled,
//!      drains it into frames, and writes them to the socket.
//! 4. Closing the session when either side ends: the peer disconnects, a read
//!    fails, a frame desynchronizes the stream, or the session is closed from
//!    inside (e.g. as a slow consumer).
//!
//! # Framing
//!
//! ```text
//! [length:u16 LE][body: length - 2 bytes]
//! ```
//!
//! The length counts its own two bytes.  Lengths below three or above the
//! configured maximum cannot be resynchronized and end the connection.

use std::io;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use realm_core::protocol::codec::{frame_len, LENGTH_PREFIX_SIZE};
use realm_core::ProtocolError;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::application::coordinator::Coordinator;
use crate::application::outbound;
use crate::application::session::Session;

/// Error type for socket-level failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

// ── Framing ───────────────────────────────────────────────────────────────────

/// Reads one frame and returns its body (wire id + payload).
///
/// Returns `Ok(None)` when the peer closed the connection before the first
/// byte of a new frame's length prefix.
///
/// # Errors
///
/// Returns [`ServerError::Protocol`] for a length outside `3..=max_frame_len`
/// and [`ServerError::Io`] for socket errors, including EOF inside a frame.
pub async fn read_frame<R>(reader: &mut R, max_frame_len: usize) -> Result<Option<Vec<u8>>, ServerError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    let first = reader.read(&mut prefix[..1]).await?;
    if first == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut prefix[1..]).await?;

    let total = frame_len(prefix, max_frame_len)?;
    let mut body = vec![0u8; total - LENGTH_PREFIX_SIZE];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Writes complete frames in order and flushes.
///
/// # Errors
///
/// Returns any I/O error from the underlying writer.
pub async fn write_frames<W>(writer: &mut W, frames: &[Vec<u8>]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    for frame in frames {
        writer.write_all(frame).await?;
    }
    writer.flush().await
}

// ── Accept loop ───────────────────────────────────────────────────────────────

/// Accepts connections on `listener` until `running` is cleared.
///
/// Each accepted connection is handed to its own Tokio task so that one slow
/// client never delays the others.
///
/// # Errors
///
/// Returns [`ServerError::Io`] if the listener's local address cannot be read.
pub async fn run_server(
    listener: TcpListener,
    coordinator: Arc<Coordinator>,
    running: Arc<AtomicBool>,
) -> Result<(), ServerError> {
    info!("game server listening on {}", listener.local_addr()?);

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Short accept timeout so the shutdown flag is seen without new connections.
        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                debug!("new connection from {peer}");
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    handle_connection(stream, peer, coordinator).await;
                });
            }
            Ok(Err(e)) => {
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    Ok(())
}

// ── Per-connection handler ────────────────────────────────────────────────────

async fn handle_connection(stream: TcpStream, peer: SocketAddr, coordinator: Arc<Coordinator>) {
    match run_connection(stream, peer, coordinator).await {
        Ok(()) => info!("connection {peer} closed"),
        Err(e) => warn!("connection {peer} closed with error: {e:#}"),
    }
}

async fn run_connection(
    stream: TcpStream,
    peer: SocketAddr,
    coordinator: Arc<Coordinator>,
) -> anyhow::Result<()> {
    stream
        .set_nodelay(true)
        .with_context(|| format!("failed to set TCP_NODELAY for {peer}"))?;
    let (mut reader, writer) = stream.into_split();

    let session = coordinator.open_session(peer).await;

    let send_task = {
        let session = Arc::clone(&session);
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            if let Err(e) = send_loop(writer, &session, &coordinator).await {
                debug!(session = %session.id(), "send loop ended: {e}");
                session.close();
            }
        })
    };

    let result = read_loop(&mut reader, &session, &coordinator).await;

    coordinator.close_session(&session).await;
    if let Err(e) = send_task.await {
        error!(session = %session.id(), "send task failed: {e}");
    }
    result
}

async fn read_loop<R>(reader: &mut R, session: &Arc<Session>, coordinator: &Coordinator) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
{
    let max_frame_len = coordinator.settings().max_frame_len;
    loop {
        let frame = tokio::select! {
            frame = read_frame(reader, max_frame_len) => frame,
            () = session.closed() => return Ok(()),
        };
        let Some(body) = frame.with_context(|| format!("reading from {}", session.peer()))? else {
            return Ok(());
        };

        let outcome = coordinator.on_frame(session, &body).await;
        if outcome.closes_connection() {
            anyhow::bail!("stream desynchronized: {outcome:?}");
        }
    }
}

async fn send_loop(mut writer: OwnedWriteHalf, session: &Session, coordinator: &Coordinator) -> io::Result<()> {
    loop {
        let frames = outbound::drain(session, coordinator.registry());
        if !frames.is_empty() {
            write_frames(&mut writer, &frames).await?;
        }
        if session.is_closed() {
            break;
        }
        session.outbound_ready().await;
    }
    writer.shutdown().await
}

// ── Tests ─────────────────────────────────────────────────────────────────────
