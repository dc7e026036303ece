//! Session/dispatch coordinator.
//!
//! The network layer talks to the application only through this type: it
//! opens a session per accepted connection, hands over each frame body it
//! reads, and closes the session when the connection ends.  Everything in
//! between (decoding, validation, execution, outbound queuing) happens behind
//! [`Coordinator::on_frame`].

use std::net::SocketAddr;
use std::sync::Arc;

use realm_core::protocol::codec::MAX_FRAME_LEN;
use realm_core::PacketRegistry;
use tracing::{info, warn};

use crate::application::context::ServerContext;
use crate::application::handlers::release_character;
use crate::application::inbound::{DecodePolicy, FrameOutcome, InboundPipeline};
use crate::application::session::Session;

/// Per-connection limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub decode_policy: DecodePolicy,
    /// Outbound queue length beyond which a session is closed as a slow consumer.
    pub max_pending_packets: usize,
    /// Largest inbound frame accepted, length prefix included.
    pub max_frame_len: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            decode_policy: DecodePolicy::default(),
            max_pending_packets: 1_024,
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}

pub struct Coordinator {
    ctx: Arc<ServerContext>,
    pipeline: InboundPipeline,
    settings: SessionSettings,
}

impl Coordinator {
    pub fn new(ctx: Arc<ServerContext>, settings: SessionSettings) -> Self {
        Self {
            pipeline: InboundPipeline::new(Arc::clone(&ctx), settings.decode_policy),
            ctx,
            settings,
        }
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    pub fn registry(&self) -> &PacketRegistry {
        &self.ctx.registry
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Creates and registers the session for a newly accepted connection.
    pub async fn open_session(&self, peer: SocketAddr) -> Arc<Session> {
        let session = Arc::new(Session::new(peer, self.settings.max_pending_packets));
        self.ctx.sessions.insert(Arc::clone(&session)).await;
        info!(session = %session.id(), %peer, "session opened");
        session
    }

    /// Runs one inbound frame body through the pipeline.  A desynchronizing
    /// frame closes the session before returning.
    pub async fn on_frame(&self, session: &Arc<Session>, body: &[u8]) -> FrameOutcome {
        let outcome = self.pipeline.handle_frame(session, body).await;
        if outcome.closes_connection() {
            self.close_session(session).await;
        }
        outcome
    }

    /// Closes `session`: pending sends are discarded, and its character (if
    /// any) leaves its rooms and the world.  Safe to call more than once.
    pub async fn close_session(&self, session: &Session) {
        session.close();
        if self.ctx.sessions.remove(session.id()).await.is_none() {
            return;
        }
        let character = session.actor();
        if let Err(e) = release_character(&self.ctx, session).await {
            warn!(session = %session.id(), "room update after disconnect failed: {e}");
        }
        info!(session = %session.id(), peer = %session.peer(), ?character, "session closed");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
