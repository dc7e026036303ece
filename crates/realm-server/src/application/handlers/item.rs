//! `ConfirmTargetItem`: can this item go into the augmentation window?
//!
//! | Condition                   | Client sees                                  |
//! |-----------------------------|----------------------------------------------|
//! | no character selected       | nothing                                      |
//! | item not in own inventory   | nothing                                      |
//! | item already augmented      | `ONCE_AN_ITEM_IS_AUGMENTED_...` message      |
//! | item not refinable          | `THIS_IS_NOT_A_SUITABLE_ITEM` message        |
//! | otherwise                   | `ExPutItemResultForVariationMake`            |

use realm_core::protocol::client_packets::ConfirmTargetItem;
use realm_core::protocol::server_packets::{SystemMessageId, VariationTargetAccepted};
use realm_core::ServerPacket;

use super::{Action, Rejection};
use crate::application::context::ServerContext;
use crate::application::session::Session;

pub(super) async fn validate(
    ctx: &ServerContext,
    session: &Session,
    packet: ConfirmTargetItem,
) -> Result<Action, Rejection> {
    let owner = session
        .actor()
        .ok_or_else(|| Rejection::silent("no active character"))?;

    let item = match ctx.world.item(packet.item_obj_id).await {
        Some(item) if item.owner_id == owner => item,
        _ => {
            return Err(Rejection::silent(format!(
                "item {} not in inventory",
                packet.item_obj_id
            )))
        }
    };

    if item.augmented {
        return Err(Rejection::notify(
            "item already augmented",
            ServerPacket::system_message(SystemMessageId::OnceAnItemIsAugmentedItCannotBeAugmentedAgain),
        ));
    }
    if !item.kind.is_refinable() {
        return Err(Rejection::notify(
            "item cannot be refined",
            ServerPacket::system_message(SystemMessageId::ThisIsNotASuitableItem),
        ));
    }

    Ok(Action::ConfirmTargetItem(VariationTargetAccepted {
        item_obj_id: item.object_id,
        item_id: item.item_id,
    }))
}

pub(super) fn execute(session: &Session, accepted: VariationTargetAccepted) {
    session.send(ServerPacket::ExPutItemResultForVariationMake(accepted));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::records::{ItemKind, ItemRecord};
    use crate::application::test_support::{context, enter_world, player, session, MockRules, MockStore};

    async fn with_item(kind: ItemKind, augmented: bool, owner: i32) -> (std::sync::Arc<ServerContext>, std::sync::Arc<Session>) {
        let ctx = context(MockRules::new(), MockStore::new());
        let s = session();
        enter_world(&ctx, &s, &player(1, "Aria")).await;
        ctx.world
            .insert_item(ItemRecord {
                object_id: 42,
                item_id: 6_579,
                owner_id: owner,
                kind,
                augmented,
            })
            .await;
        (ctx, s)
    }

    #[tokio::test]
    async fn test_refinable_own_item_is_accepted() {
        // Arrange
        let (ctx, s) = with_item(ItemKind::Weapon, false, 1).await;

        // Act
        let action = validate(&ctx, &s, ConfirmTargetItem { item_obj_id: 42 }).await.unwrap();

        // Assert
        match action {
            Action::ConfirmTargetItem(accepted) => {
                assert_eq!(accepted, VariationTargetAccepted { item_obj_id: 42, item_id: 6_579 })
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_augmented_item_reports_already_augmented() {
        // Etc + augmented still reports "already augmented": augmentation wins.
        let (ctx, s) = with_item(ItemKind::Etc, true, 1).await;

        let rejection = validate(&ctx, &s, ConfirmTargetItem { item_obj_id: 42 }).await.unwrap_err();

        assert_eq!(
            rejection.notify,
            Some(ServerPacket::system_message(
                SystemMessageId::OnceAnItemIsAugmentedItCannotBeAugmentedAgain
            ))
        );
    }

    #[tokio::test]
    async fn test_unrefinable_item_reports_not_suitable() {
        let (ctx, s) = with_item(ItemKind::Etc, false, 1).await;

        let rejection = validate(&ctx, &s, ConfirmTargetItem { item_obj_id: 42 }).await.unwrap_err();

        assert_eq!(
            rejection.notify,
            Some(ServerPacket::system_message(SystemMessageId::ThisIsNotASuitableItem))
        );
    }

    #[tokio::test]
    async fn test_foreign_item_is_rejected_silently() {
        let (ctx, s) = with_item(ItemKind::Weapon, false, 2).await;

        let rejection = validate(&ctx, &s, ConfirmTargetItem { item_obj_id: 42 }).await.unwrap_err();

        assert_eq!(rejection.notify, None);
    }

    #[tokio::test]
    async fn test_no_character_is_rejected_silently() {
        let ctx = context(MockRules::new(), MockStore::new());

        let rejection = validate(&ctx, &session(), ConfirmTargetItem { item_obj_id: 42 })
            .await
            .unwrap_err();

        assert_eq!(rejection.notify, None);
    }
}
