//! `Attack` and `MagicSkillUse`.
//!
//! Both are hostile actions against another creature.  Validation refuses
//! with `ActionFailed` when the target is unknown, is not a creature, is the
//! actor itself, or either side is already dead; with no character selected
//! the packet is ignored.  Execute locks attacker and target together (lowest
//! object id first), re-checks liveness, applies damage, and queues the
//! result packets once both locks are released.

use std::sync::Arc;

use realm_core::protocol::client_packets::{Attack, MagicSkillUse};
use realm_core::protocol::server_packets::{
    AttackResult, MagicSkillCast, StatusAttribute, StatusUpdate,
};
use realm_core::{InstanceType, ObjectId, ServerPacket};
use tracing::debug;

use super::{active_actor, deliver, hostile_target, Action, ExecutionFault, Rejection};
use crate::application::collaborators::{CombatAction, CombatContext, CombatantView};
use crate::application::context::ServerContext;
use crate::application::effects::{capped_damage, damage_messages, Combatant, FatalBlow};
use crate::application::records::SkillTemplate;
use crate::application::session::Session;
use crate::application::world::{lock_pair, ActorCell};

// ── Attack ────────────────────────────────────────────────────────────────────

pub(super) async fn validate_attack(
    ctx: &ServerContext,
    session: &Session,
    packet: Attack,
) -> Result<Action, Rejection> {
    let attacker = active_actor(ctx, session)
        .await
        .ok_or_else(|| Rejection::silent("no active character"))?;
    let target = hostile_target(ctx, &attacker, packet.target_obj_id).await?;
    Ok(Action::Attack { attacker, target })
}

pub(super) async fn execute_attack(
    ctx: &ServerContext,
    session: &Arc<Session>,
    attacker: &ActorCell,
    target: &ActorCell,
) -> Result<(), ExecutionFault> {
    let (result, hp) = {
        let (mut a, mut t) = lock_pair(attacker, target, ctx.settings.lock_timeout).await?;
        if a.dead || t.dead {
            drop((a, t));
            debug!(attacker = attacker.object_id, target = target.object_id, "attack on stale target");
            session.send(ServerPacket::ActionFailed);
            return Ok(());
        }

        let outcome = ctx.rules.compute_outcome(
            &CombatantView::of(attacker, &a),
            &CombatantView::of(target, &t),
            &CombatContext {
                action: CombatAction::MeleeAttack,
            },
        );

        a.attacking = Some(target.object_id);
        let damage = if outcome.landed {
            let limit = t.damage_limit;
            t.reduce_hp(capped_damage(outcome.damage, outcome.critical, limit))
        } else {
            0
        };
        if outcome.landed
            && outcome.breaks_action
            && !ctx.is_kind(target.kind, InstanceType::RaidBoss)
        {
            t.break_attack();
            t.break_cast();
        }
        if t.dead {
            a.attacking = None;
        }

        (
            AttackResult {
                attacker_obj_id: attacker.object_id,
                target_obj_id: target.object_id,
                damage,
                critical: outcome.landed && outcome.critical,
                miss: !outcome.landed,
            },
            t.current_hp,
        )
    };

    let mut packets = vec![
        (attacker.object_id, ServerPacket::AttackResult(result)),
        (target.object_id, ServerPacket::AttackResult(result)),
    ];
    packets.extend(hp_updates(attacker.object_id, target.object_id, hp));
    if !result.miss {
        packets.extend(damage_messages(attacker, target, result.damage, result.critical));
    }
    deliver(ctx, packets).await;
    Ok(())
}

// ── Skills ────────────────────────────────────────────────────────────────────

pub(super) async fn validate_skill(
    ctx: &ServerContext,
    session: &Session,
    packet: MagicSkillUse,
) -> Result<Action, Rejection> {
    let caster = active_actor(ctx, session)
        .await
        .ok_or_else(|| Rejection::silent("no active character"))?;
    let skill = match ctx.store.skill(packet.skill_id).await {
        Ok(Some(skill)) => skill,
        Ok(None) => {
            return Err(Rejection::action_failed(format!(
                "unknown skill {}",
                packet.skill_id
            )))
        }
        Err(e) => return Err(Rejection::action_failed(e.to_string())),
    };
    let target = hostile_target(ctx, &caster, packet.target_obj_id).await?;
    Ok(Action::MagicSkillUse {
        caster,
        target,
        skill,
    })
}

pub(super) async fn execute_skill(
    ctx: &ServerContext,
    session: &Arc<Session>,
    caster: &ActorCell,
    target: &ActorCell,
    skill: &SkillTemplate,
) -> Result<(), ExecutionFault> {
    let (report, hp) = {
        let (mut c, mut t) = lock_pair(caster, target, ctx.settings.lock_timeout).await?;
        if c.dead || t.dead {
            drop((c, t));
            session.send(ServerPacket::ActionFailed);
            return Ok(());
        }

        let report = FatalBlow::from(skill).apply(
            ctx,
            Combatant {
                cell: caster,
                state: &mut c,
            },
            Combatant {
                cell: target,
                state: &mut t,
            },
        );
        (report, t.current_hp)
    };

    let cast = ServerPacket::MagicSkillUse(MagicSkillCast {
        caster_obj_id: caster.object_id,
        target_obj_id: target.object_id,
        skill_id: skill.skill_id,
        skill_level: skill.level,
        hit_time_ms: skill.hit_time_ms,
        reuse_delay_ms: skill.reuse_delay_ms,
    });
    let mut packets = vec![(caster.object_id, cast.clone()), (target.object_id, cast)];
    if let Some(report) = report.filter(|r| r.landed) {
        packets.extend(hp_updates(caster.object_id, target.object_id, hp));
        packets.extend(damage_messages(caster, target, report.damage, report.critical));
    }
    deliver(ctx, packets).await;
    Ok(())
}

/// The target's new hp, for both sides of the fight.
fn hp_updates(attacker: ObjectId, target: ObjectId, hp: i32) -> Vec<(ObjectId, ServerPacket)> {
    let update = ServerPacket::StatusUpdate(StatusUpdate {
        object_id: target,
        attributes: vec![(StatusAttribute::CurrentHp, hp)],
    });
    vec![(attacker, update.clone()), (target, update)]
}

// ── Tests ─────────────────────────────────────────────────────────────────────
