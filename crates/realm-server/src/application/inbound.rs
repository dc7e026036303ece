//! Inbound packet pipeline: one frame body in, one [`FrameOutcome`] out.
//!
//! # The per-frame state machine
//!
//! ```text
//! Received ──decode──▶ Decoded ──validate──▶ Validated ──execute──▶ Executed
//!     │                   │                      │
//!     ▼                   ▼                      ▼
//!   Failed             Rejected                Failed
//! ```
//!
//! - **Decode** resolves the wire id through the registry and reads the
//!   payload.  An unknown opcode is logged and skipped.  A malformed payload
//!   is handled according to the configured [`DecodePolicy`].
//! - **Validate** is read-only.  A rejection may queue one notification packet
//!   on the acting session; the world is never touched.
//! - **Execute** runs on its own task.  A fault or a panic there is confined
//!   to this frame; the connection carries on.
//!
//! Frames from one session are handled one at a time, in arrival order.

use std::any::Any;
use std::sync::Arc;

use realm_core::{ClientPacket, ClientPacketId, PacketReader, ProtocolError, Resolution, WireId};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::application::context::ServerContext;
use crate::application::handlers::{self, ExecutionFault};
use crate::application::session::Session;

/// What to do with a frame whose payload cannot be decoded.
///
/// A length-prefixed stream stays aligned even when one payload is garbage,
/// so dropping just that frame is safe; `Strict` treats it as a hostile or
/// broken client instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecodePolicy {
    /// Close the connection.
    #[default]
    Strict,
    /// Discard the frame and keep reading.
    DropFrame,
}

/// Where a frame's processing ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketStage {
    Received,
    Decoded,
    Validated,
    Executed,
    Rejected,
    Failed,
}

/// The result of pushing one frame through the pipeline.
#[derive(Debug)]
pub enum FrameOutcome {
    Executed(ClientPacketId),
    /// Validation refused the packet.  Any notification has already been queued.
    Rejected {
        packet: ClientPacketId,
        reason: String,
    },
    UnknownOpcode(WireId),
    /// Undecodable payload, discarded under [`DecodePolicy::DropFrame`].
    Dropped(ProtocolError),
    /// Undecodable payload under [`DecodePolicy::Strict`]; the connection must close.
    Desynchronized(ProtocolError),
    Faulted {
        packet: ClientPacketId,
        fault: ExecutionFault,
    },
}

impl FrameOutcome {
    /// The terminal stage this outcome corresponds to.
    pub fn stage(&self) -> PacketStage {
        match self {
            FrameOutcome::Executed(_) => PacketStage::Executed,
            FrameOutcome::Rejected { .. } => PacketStage::Rejected,
            FrameOutcome::UnknownOpcode(_)
            | FrameOutcome::Dropped(_)
            | FrameOutcome::Desynchronized(_)
            | FrameOutcome::Faulted { .. } => PacketStage::Failed,
        }
    }

    pub fn closes_connection(&self) -> bool {
        matches!(self, FrameOutcome::Desynchronized(_))
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

pub struct InboundPipeline {
    ctx: Arc<ServerContext>,
    policy: DecodePolicy,
}

impl InboundPipeline {
    pub fn new(ctx: Arc<ServerContext>, policy: DecodePolicy) -> Self {
        Self { ctx, policy }
    }

    pub fn policy(&self) -> DecodePolicy {
        self.policy
    }

    /// Decodes, validates and executes one frame body (wire id + payload).
    pub async fn handle_frame(&self, session: &Arc<Session>, body: &[u8]) -> FrameOutcome {
        let packet = match self.decode(body) {
            Ok(Resolution::Known(packet)) => packet,
            Ok(Resolution::Unknown(wire)) => {
                debug!(session = %session.id(), %wire, "unknown opcode; frame skipped");
                return FrameOutcome::UnknownOpcode(wire);
            }
            Err(e) => return self.decode_failure(session, e),
        };
        let id = packet.id();
        debug!(session = %session.id(), packet = ?id, stage = ?PacketStage::Decoded, "frame decoded");

        let action = match handlers::validate(&self.ctx, session, packet).await {
            Ok(action) => action,
            Err(rejection) => {
                debug!(
                    session = %session.id(),
                    packet = ?id,
                    reason = %rejection.reason,
                    notified = rejection.notify.is_some(),
                    "packet rejected"
                );
                if let Some(notify) = rejection.notify {
                    session.send(notify);
                }
                return FrameOutcome::Rejected {
                    packet: id,
                    reason: rejection.reason,
                };
            }
        };
        debug!(session = %session.id(), packet = ?id, stage = ?PacketStage::Validated, "packet validated");

        // Runs to completion even if the connection goes away meanwhile.
        let ctx = Arc::clone(&self.ctx);
        let acting = Arc::clone(session);
        let task = tokio::spawn(async move { handlers::execute(&ctx, &acting, action).await });

        match task.await {
            Ok(Ok(())) => FrameOutcome::Executed(id),
            Ok(Err(fault)) => {
                warn!(session = %session.id(), packet = ?id, "execution failed: {fault}");
                FrameOutcome::Faulted { packet: id, fault }
            }
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    panic_message(join_error.into_panic())
                } else {
                    "execution task cancelled".to_string()
                };
                error!(session = %session.id(), packet = ?id, "execution panicked: {message}");
                FrameOutcome::Faulted {
                    packet: id,
                    fault: ExecutionFault::Panicked(message),
                }
            }
        }
    }

    fn decode(&self, body: &[u8]) -> Result<Resolution<ClientPacket>, ProtocolError> {
        let mut reader = PacketReader::new(body);
        match self.ctx.registry.read_inbound(&mut reader)? {
            Resolution::Known(id) => Ok(Resolution::Known(ClientPacket::decode(id, &mut reader)?)),
            Resolution::Unknown(wire) => Ok(Resolution::Unknown(wire)),
        }
    }

    fn decode_failure(&self, session: &Session, error: ProtocolError) -> FrameOutcome {
        match self.policy {
            DecodePolicy::Strict => {
                warn!(session = %session.id(), peer = %session.peer(), "undecodable frame; closing connection: {error}");
                FrameOutcome::Desynchronized(error)
            }
            DecodePolicy::DropFrame => {
                warn!(session = %session.id(), peer = %session.peer(), "undecodable frame dropped: {error}");
                FrameOutcome::Dropped(error)
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
