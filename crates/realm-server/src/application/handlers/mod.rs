//! Validate/execute pairs for every client packet.
//!
//! # Two phases
//!
//! **Validate** is read-only.  It checks the packet against the session and
//! the world and either produces an [`Action`], which carries everything
//! execute needs, or a [`Rejection`], which optionally names one packet to
//! send back.  It never mutates the world and never waits on an actor lock:
//! liveness checks use [`ActorCell::try_state`] and are skipped while an
//! execute step holds the lock.
//!
//! **Execute** applies the action.  It takes actor locks with the configured
//! timeout and re-checks anything that may have changed since validation
//! (time-of-check vs time-of-use).  A condition that no longer holds ends the
//! step quietly with an `ActionFailed` to the client; only infrastructure-style
//! failures (lock timeouts, store errors) are returned as [`ExecutionFault`]s.
//!
//! # Sub-modules
//!
//! - **`character`** – `SelectCharacter`, `Logout`, and character release on disconnect.
//! - **`combat`** – `Attack` and `MagicSkillUse`.
//! - **`henna`** – `HennaItemRemoveInfo`.
//! - **`item`** – `ConfirmTargetItem`.
//! - **`matching`** – `JoinMatchingRoom` and room broadcasts.
//! - **`connection`** – `NetPing`.

use std::sync::Arc;

use realm_core::protocol::client_packets::NetPing;
use realm_core::protocol::server_packets::VariationTargetAccepted;
use realm_core::{ClientPacket, InstanceType, ObjectId, ServerPacket};

use crate::application::context::ServerContext;
use crate::application::records::{CharacterRecord, HennaTemplate, SkillTemplate};
use crate::application::session::Session;
use crate::application::world::ActorCell;

pub use crate::application::world::ExecutionFault;

pub mod character;
pub mod combat;
pub mod connection;
pub mod henna;
pub mod item;
pub mod matching;

pub(crate) use character::release_character;

// ── Validation results ────────────────────────────────────────────────────────

/// A validated packet, ready to execute.
#[derive(Debug)]
pub enum Action {
    Logout {
        actor: ObjectId,
    },
    ConfirmTargetItem(VariationTargetAccepted),
    Attack {
        attacker: Arc<ActorCell>,
        target: Arc<ActorCell>,
    },
    SelectCharacter(CharacterRecord),
    MagicSkillUse {
        caster: Arc<ActorCell>,
        target: Arc<ActorCell>,
        skill: SkillTemplate,
    },
    HennaRemovalPreview {
        actor: Arc<ActorCell>,
        henna: HennaTemplate,
    },
    JoinMatchingRoom {
        actor: ObjectId,
        room_id: i32,
    },
    NetPing(NetPing),
}

/// Why a packet was refused, and what (if anything) the client is told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: String,
    pub notify: Option<ServerPacket>,
}

impl Rejection {
    /// Refuse without telling the client anything.
    pub fn silent(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            notify: None,
        }
    }

    pub fn notify(reason: impl Into<String>, packet: ServerPacket) -> Self {
        Self {
            reason: reason.into(),
            notify: Some(packet),
        }
    }

    pub fn action_failed(reason: impl Into<String>) -> Self {
        Self::notify(reason, ServerPacket::ActionFailed)
    }
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

/// Validates `packet` for `session`.
///
/// # Errors
///
/// Returns the [`Rejection`] chosen by the packet's handler.
pub async fn validate(
    ctx: &ServerContext,
    session: &Session,
    packet: ClientPacket,
) -> Result<Action, Rejection> {
    match packet {
        ClientPacket::Logout => character::validate_logout(session),
        ClientPacket::ConfirmTargetItem(p) => item::validate(ctx, session, p).await,
        ClientPacket::Attack(p) => combat::validate_attack(ctx, session, p).await,
        ClientPacket::SelectCharacter(p) => character::validate_select(ctx, session, p).await,
        ClientPacket::MagicSkillUse(p) => combat::validate_skill(ctx, session, p).await,
        ClientPacket::HennaItemRemoveInfo(p) => henna::validate(ctx, session, p).await,
        ClientPacket::JoinMatchingRoom(p) => matching::validate(ctx, session, p).await,
        ClientPacket::NetPing(p) => Ok(Action::NetPing(p)),
    }
}

/// Executes a validated action on behalf of `session`.
///
/// # Errors
///
/// Returns an [`ExecutionFault`] when a lock times out or a collaborator fails.
pub async fn execute(
    ctx: &ServerContext,
    session: &Arc<Session>,
    action: Action,
) -> Result<(), ExecutionFault> {
    match action {
        Action::Logout { actor } => character::execute_logout(ctx, session, actor).await,
        Action::ConfirmTargetItem(accepted) => {
            item::execute(session, accepted);
            Ok(())
        }
        Action::Attack { attacker, target } => {
            combat::execute_attack(ctx, session, &attacker, &target).await
        }
        Action::SelectCharacter(record) => character::execute_select(ctx, session, record).await,
        Action::MagicSkillUse { caster, target, skill } => {
            combat::execute_skill(ctx, session, &caster, &target, &skill).await
        }
        Action::HennaRemovalPreview { actor, henna } => {
            henna::execute(ctx, session, &actor, &henna).await
        }
        Action::JoinMatchingRoom { actor, room_id } => {
            matching::execute(ctx, session, actor, room_id).await
        }
        Action::NetPing(ping) => {
            connection::execute_ping(session, ping);
            Ok(())
        }
    }
}

// ── Shared checks ─────────────────────────────────────────────────────────────

/// The world cell of the character `session` controls.
async fn active_actor(ctx: &ServerContext, session: &Session) -> Option<Arc<ActorCell>> {
    let object_id = session.actor()?;
    ctx.world.actor(object_id).await
}

/// `true` only when the actor is known to be dead.  An actor whose lock is
/// held by an execute step counts as alive; execute re-checks.
fn known_dead(cell: &ActorCell) -> bool {
    cell.try_state().is_some_and(|state| state.dead)
}

/// Resolves and checks the target of a hostile action.
async fn hostile_target(
    ctx: &ServerContext,
    actor: &ActorCell,
    target_obj_id: ObjectId,
) -> Result<Arc<ActorCell>, Rejection> {
    if target_obj_id == actor.object_id {
        return Err(Rejection::action_failed("cannot target self"));
    }
    let target = ctx
        .world
        .actor(target_obj_id)
        .await
        .ok_or_else(|| Rejection::action_failed(format!("unknown target {target_obj_id}")))?;
    if !ctx.is_kind(target.kind, InstanceType::Creature) {
        return Err(Rejection::action_failed(format!(
            "target {target_obj_id} is a {}, not a creature",
            target.kind
        )));
    }
    if known_dead(actor) {
        return Err(Rejection::action_failed("actor is dead"));
    }
    if known_dead(&target) {
        return Err(Rejection::action_failed(format!("target {target_obj_id} is dead")));
    }
    Ok(target)
}

/// Queues each `(recipient, packet)` on the recipient's session, if any.
async fn deliver(ctx: &ServerContext, packets: Vec<(ObjectId, ServerPacket)>) {
    for (recipient, packet) in packets {
        ctx.sessions.send_to_actor(recipient, packet).await;
    }
}
