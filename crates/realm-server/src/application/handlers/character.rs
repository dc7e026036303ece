//! `SelectCharacter` and `Logout`, plus the release path shared with
//! disconnects.
//!
//! Selection is refused with `ActionFailed` when the session already controls
//! a character, the id is unknown, the record is not a player, or another
//! session controls it.  The binding itself is claimed atomically in execute,
//! so two sessions racing for one character cannot both win.

use std::sync::Arc;

use realm_core::protocol::client_packets::SelectCharacter;
use realm_core::protocol::server_packets::CharSelected;
use realm_core::{InstanceType, ObjectId, ServerPacket};
use tracing::{debug, info, warn};

use super::{matching, Action, ExecutionFault, Rejection};
use crate::application::context::ServerContext;
use crate::application::records::CharacterRecord;
use crate::application::session::Session;
use crate::application::world::ActorCell;

// ── SelectCharacter ───────────────────────────────────────────────────────────

pub(super) async fn validate_select(
    ctx: &ServerContext,
    session: &Session,
    packet: SelectCharacter,
) -> Result<Action, Rejection> {
    if let Some(current) = session.actor() {
        return Err(Rejection::action_failed(format!("already playing {current}")));
    }
    let record = match ctx.store.load_character(packet.char_obj_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return Err(Rejection::action_failed(format!(
                "unknown character {}",
                packet.char_obj_id
            )))
        }
        Err(e) => return Err(Rejection::action_failed(e.to_string())),
    };
    if !ctx.is_kind(record.kind, InstanceType::Player) {
        return Err(Rejection::action_failed(format!(
            "{} is a {}, not a player",
            record.object_id, record.kind
        )));
    }
    if ctx.sessions.session_for_actor(record.object_id).await.is_some() {
        return Err(Rejection::action_failed(format!(
            "character {} is controlled by another session",
            record.object_id
        )));
    }
    Ok(Action::SelectCharacter(record))
}

pub(super) async fn execute_select(
    ctx: &ServerContext,
    session: &Arc<Session>,
    record: CharacterRecord,
) -> Result<(), ExecutionFault> {
    if !ctx.sessions.bind_actor(record.object_id, session.id()).await {
        debug!(session = %session.id(), character = record.object_id, "lost selection race");
        session.send(ServerPacket::ActionFailed);
        return Ok(());
    }
    let Some(cell) = ctx.world.try_spawn(ActorCell::from_character(&record)).await else {
        warn!(session = %session.id(), character = record.object_id, "object id already in use by another actor");
        ctx.sessions.unbind_actor(record.object_id, session.id()).await;
        session.send(ServerPacket::ActionFailed);
        return Ok(());
    };
    session.set_actor(Some(record.object_id));

    if session.is_closed() {
        // The connection dropped while we were binding; undo it.
        release_character(ctx, session).await?;
        return Ok(());
    }

    let selected = {
        let state = cell.lock(ctx.settings.lock_timeout).await?;
        CharSelected {
            object_id: cell.object_id,
            name: cell.name.clone(),
            class_id: state.class_id,
            level: state.level,
            current_hp: state.current_hp,
            max_hp: state.max_hp,
        }
    };
    info!(session = %session.id(), character = cell.object_id, name = %cell.name, "character entered world");
    session.send(ServerPacket::CharSelected(selected));
    Ok(())
}

// ── Logout ────────────────────────────────────────────────────────────────────

pub(super) fn validate_logout(session: &Session) -> Result<Action, Rejection> {
    session
        .actor()
        .map(|actor| Action::Logout { actor })
        .ok_or_else(|| Rejection::silent("no active character"))
}

pub(super) async fn execute_logout(
    ctx: &ServerContext,
    session: &Arc<Session>,
    actor: ObjectId,
) -> Result<(), ExecutionFault> {
    if session.actor() != Some(actor) {
        return Ok(());
    }
    release_character(ctx, session).await?;
    info!(session = %session.id(), character = actor, "character left world");
    session.send(ServerPacket::LeaveWorld);
    Ok(())
}

/// Takes the session's character out of the world: unbinds it, removes it
/// from matching rooms (updating the remaining members), and despawns it.
/// Does nothing when the session has no character.
///
/// # Errors
///
/// Returns [`ExecutionFault::LockTimeout`] if a remaining room member's lock
/// cannot be taken for the room update.  The character is released regardless.
pub(crate) async fn release_character(
    ctx: &ServerContext,
    session: &Session,
) -> Result<(), ExecutionFault> {
    let Some(actor) = session.actor() else {
        return Ok(());
    };
    session.set_actor(None);
    ctx.sessions.unbind_actor(actor, session.id()).await;
    let rooms = ctx.world.leave_rooms(actor).await;
    ctx.world.despawn(actor).await;

    for room in &rooms {
        matching::broadcast_room(ctx, room).await?;
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
