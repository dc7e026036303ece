//! `JoinMatchingRoom` and the `ExMPCCRoomMember` broadcast.
//!
//! Every change to a room's membership is followed by a fresh member list to
//! each remaining member.  The list is the same for everyone except the
//! `viewer_type` field, which tells each recipient their own role.

use std::sync::Arc;

use realm_core::protocol::client_packets::JoinMatchingRoom;
use realm_core::protocol::server_packets::{RoomMemberList, RoomMemberSnapshot};
use realm_core::{ObjectId, ServerPacket};
use tracing::debug;

use super::{Action, ExecutionFault, Rejection};
use crate::application::context::ServerContext;
use crate::application::session::Session;
use crate::application::world::MatchingRoom;

pub(super) async fn validate(
    ctx: &ServerContext,
    session: &Session,
    packet: JoinMatchingRoom,
) -> Result<Action, Rejection> {
    let actor = session
        .actor()
        .ok_or_else(|| Rejection::silent("no active character"))?;
    if ctx.world.room(packet.room_id).await.is_none() {
        return Err(Rejection::action_failed(format!(
            "unknown matching room {}",
            packet.room_id
        )));
    }
    Ok(Action::JoinMatchingRoom {
        actor,
        room_id: packet.room_id,
    })
}

pub(super) async fn execute(
    ctx: &ServerContext,
    session: &Arc<Session>,
    actor: ObjectId,
    room_id: i32,
) -> Result<(), ExecutionFault> {
    let Some(room) = ctx.world.join_room(room_id, actor).await else {
        session.send(ServerPacket::ActionFailed);
        return Ok(());
    };
    debug!(session = %session.id(), actor, room_id, members = room.members.len(), "joined matching room");
    broadcast_room(ctx, &room).await
}

/// Sends the current member list of `room` to each of its members.
///
/// Members that have left the world since the room state was read are left
/// out of the list.
///
/// # Errors
///
/// Returns [`ExecutionFault::LockTimeout`] if a member's state cannot be
/// locked in time; nothing is sent in that case.
pub(crate) async fn broadcast_room(
    ctx: &ServerContext,
    room: &MatchingRoom,
) -> Result<(), ExecutionFault> {
    let mut members = Vec::with_capacity(room.members.len());
    for &object_id in &room.members {
        let Some(cell) = ctx.world.actor(object_id).await else {
            continue;
        };
        let state = cell.lock(ctx.settings.lock_timeout).await?;
        members.push(RoomMemberSnapshot {
            object_id,
            name: cell.name.clone(),
            level: state.level,
            class_id: state.class_id,
            location_id: state.location_id,
            member_type: room.member_type(object_id),
        });
    }

    for member in &members {
        let list = RoomMemberList {
            viewer_type: member.member_type,
            members: members.clone(),
        };
        ctx.sessions
            .send_to_actor(member.object_id, ServerPacket::ExMpccRoomMember(list))
            .await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers;
    use crate::application::test_support::{context, enter_world, player, session, MockRules, MockStore};
    use realm_core::protocol::server_packets::RoomMemberType;
    use realm_core::ClientPacket;

    fn join(room_id: i32) -> ClientPacket {
        ClientPacket::JoinMatchingRoom(JoinMatchingRoom { room_id })
    }

    fn member_list(packets: &[ServerPacket]) -> &RoomMemberList {
        match packets {
            [ServerPacket::ExMpccRoomMember(list)] => list,
            other => panic!("expected one member list, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_each_member_gets_their_own_viewer_type() {
        // Arrange
        let ctx = context(MockRules::new(), MockStore::new());
        let (leader, joiner) = (session(), session());
        enter_world(&ctx, &leader, &player(1, "Aria")).await;
        enter_world(&ctx, &joiner, &player(2, "Brom")).await;
        ctx.world.create_room(7).await;
        ctx.world.join_room(7, 1).await;

        // Act
        let action = handlers::validate(&ctx, &joiner, join(7)).await.unwrap();
        handlers::execute(&ctx, &joiner, action).await.unwrap();

        // Assert
        let seen_by_leader = leader.take_pending();
        let seen_by_joiner = joiner.take_pending();
        let leader_list = member_list(&seen_by_leader);
        let joiner_list = member_list(&seen_by_joiner);
        assert_eq!(leader_list.viewer_type, RoomMemberType::Leader);
        assert_eq!(joiner_list.viewer_type, RoomMemberType::Member);
        assert_eq!(leader_list.members, joiner_list.members);
        let names: Vec<&str> = leader_list.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Aria", "Brom"]);
    }

    #[tokio::test]
    async fn test_unknown_room_is_action_failed() {
        let ctx = context(MockRules::new(), MockStore::new());
        let s = session();
        enter_world(&ctx, &s, &player(1, "Aria")).await;

        let rejection = handlers::validate(&ctx, &s, join(404)).await.unwrap_err();

        assert_eq!(rejection.notify, Some(ServerPacket::ActionFailed));
    }

    #[tokio::test]
    async fn test_join_without_character_is_silent() {
        let ctx = context(MockRules::new(), MockStore::new());
        ctx.world.create_room(1).await;

        let rejection = handlers::validate(&ctx, &session(), join(1)).await.unwrap_err();

        assert_eq!(rejection.notify, None);
    }

    #[tokio::test]
    async fn test_broadcast_skips_members_no_longer_in_world() {
        // Arrange
        let ctx = context(MockRules::new(), MockStore::new());
        let s = session();
        enter_world(&ctx, &s, &player(1, "Aria")).await;
        ctx.world.create_room(3).await;
        ctx.world.join_room(3, 1).await;
        let room = ctx.world.join_room(3, 99).await.unwrap();

        // Act
        broadcast_room(&ctx, &room).await.unwrap();

        // Assert
        let sent = s.take_pending();
        let list = member_list(&sent);
        assert_eq!(list.members.len(), 1);
        assert_eq!(list.members[0].object_id, 1);
    }

    #[tokio::test]
    async fn test_broadcast_times_out_on_held_member() {
        // Arrange
        let ctx = context(MockRules::new(), MockStore::new());
        let s = session();
        let cell = enter_world(&ctx, &s, &player(1, "Aria")).await;
        ctx.world.create_room(3).await;
        let room = ctx.world.join_room(3, 1).await.unwrap();
        let _held = cell.lock(ctx.settings.lock_timeout).await.unwrap();

        // Act
        let result = broadcast_room(&ctx, &room).await;

        // Assert
        assert!(matches!(result, Err(ExecutionFault::LockTimeout { object_id: 1, .. })));
        assert_eq!(s.pending_len(), 0);
    }
}
