//! `HennaItemRemoveInfo`: preview of what removing a dye symbol would cost and
//! how the character's stats would change.
//!
//! No character or symbol `0` is ignored silently.  An unknown symbol is
//! logged and answered with `ActionFailed`.

use std::sync::Arc;

use realm_core::protocol::client_packets::HennaItemRemoveInfo;
use realm_core::protocol::server_packets::{HennaRemovalPreview, StatPreview};
use realm_core::ServerPacket;
use tracing::warn;

use super::{active_actor, Action, ExecutionFault, Rejection};
use crate::application::context::ServerContext;
use crate::application::records::HennaTemplate;
use crate::application::session::Session;
use crate::application::world::ActorCell;

pub(super) async fn validate(
    ctx: &ServerContext,
    session: &Session,
    packet: HennaItemRemoveInfo,
) -> Result<Action, Rejection> {
    let actor = active_actor(ctx, session)
        .await
        .ok_or_else(|| Rejection::silent("no active character"))?;
    if packet.symbol_id == 0 {
        return Err(Rejection::silent("symbol id 0"));
    }

    match ctx.store.henna(packet.symbol_id).await {
        Ok(Some(henna)) => Ok(Action::HennaRemovalPreview { actor, henna }),
        Ok(None) => {
            warn!(
                session = %session.id(),
                actor = actor.object_id,
                symbol_id = packet.symbol_id,
                "preview requested for unknown henna"
            );
            Err(Rejection::action_failed(format!("unknown henna {}", packet.symbol_id)))
        }
        Err(e) => Err(Rejection::action_failed(e.to_string())),
    }
}

pub(super) async fn execute(
    ctx: &ServerContext,
    session: &Arc<Session>,
    actor: &ActorCell,
    henna: &HennaTemplate,
) -> Result<(), ExecutionFault> {
    let preview = {
        let state = actor.lock(ctx.settings.lock_timeout).await?;
        let current = state.stats.in_preview_order();
        let after = state.stats.minus(&henna.bonus).in_preview_order();
        let mut stats = [StatPreview::default(); 6];
        for (slot, (now, then)) in stats.iter_mut().zip(current.into_iter().zip(after)) {
            *slot = StatPreview {
                current: now,
                after_removal: then,
            };
        }
        HennaRemovalPreview {
            symbol_id: henna.symbol_id,
            dye_item_id: henna.dye_item_id,
            cancel_count: henna.cancel_count,
            cancel_fee: henna.cancel_fee,
            can_remove: state.adena >= henna.cancel_fee,
            adena: state.adena,
            stats,
        }
    };
    session.send(ServerPacket::HennaItemRemoveInfo(preview));
    Ok(())
}
