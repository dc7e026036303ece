//! Instant skill effects.
//!
//! Effects run inside an execute step, with both the effector's and the
//! effected actor's locks already held, and must not await.  They report what
//! happened so the caller can queue packets after the locks are released.

use realm_core::protocol::server_packets::{MessageParam, SystemMessage, SystemMessageId};
use realm_core::{InstanceType, ObjectId, ServerPacket};

use crate::application::collaborators::{CombatAction, CombatContext, CombatantView};
use crate::application::context::ServerContext;
use crate::application::records::SkillTemplate;
use crate::application::world::{ActorCell, ActorState};

/// One side of an effect: identity plus the locked state.
pub struct Combatant<'a> {
    pub cell: &'a ActorCell,
    pub state: &'a mut ActorState,
}

/// What a blow did to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlowReport {
    pub landed: bool,
    pub damage: i32,
    pub critical: bool,
    pub broke_action: bool,
    pub killed: bool,
}

// ── Fatal blow ────────────────────────────────────────────────────────────────

/// Physical blow that can crit for double damage and interrupt the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FatalBlow {
    pub power: f64,
    pub chance: f64,
    pub critical_chance: f64,
    pub over_hit: bool,
}

impl From<&SkillTemplate> for FatalBlow {
    fn from(skill: &SkillTemplate) -> Self {
        Self {
            power: skill.power,
            chance: skill.chance,
            critical_chance: skill.critical_chance,
            over_hit: skill.over_hit,
        }
    }
}

impl FatalBlow {
    /// Applies the blow.  Returns `None` when the effector is already dead and
    /// nothing happens at all.
    ///
    /// Order of application:
    /// 1. over-hit is armed on attackable targets, whether or not the blow lands;
    /// 2. the combat rules decide landing, base damage and critical;
    /// 3. a critical doubles the damage, then the target's damage limit caps it;
    /// 4. damage is applied (possibly killing the target);
    /// 5. non-raid targets have their attack and cast broken.
    pub fn apply(
        &self,
        ctx: &ServerContext,
        effector: Combatant<'_>,
        effected: Combatant<'_>,
    ) -> Option<BlowReport> {
        if effector.state.dead {
            return None;
        }
        if self.over_hit && ctx.is_kind(effected.cell.kind, InstanceType::Attackable) {
            effected.state.over_hit_enabled = true;
        }

        let outcome = ctx.rules.compute_outcome(
            &CombatantView::of(effector.cell, effector.state),
            &CombatantView::of(effected.cell, effected.state),
            &CombatContext {
                action: CombatAction::Blow {
                    power: self.power,
                    chance: self.chance,
                    critical_chance: self.critical_chance,
                },
            },
        );
        if !outcome.landed {
            return Some(BlowReport::default());
        }

        let damage = capped_damage(outcome.damage, outcome.critical, effected.state.damage_limit);
        let applied = effected.state.reduce_hp(damage);

        let mut broke_action = false;
        if outcome.breaks_action && !ctx.is_kind(effected.cell.kind, InstanceType::RaidBoss) {
            let broke_attack = effected.state.break_attack();
            let broke_cast = effected.state.break_cast();
            broke_action = broke_attack || broke_cast;
        }

        Some(BlowReport {
            landed: true,
            damage: applied,
            critical: outcome.critical,
            broke_action,
            killed: effected.state.dead,
        })
    }
}

/// Doubles on a critical, then caps at `limit` when it is positive.
pub fn capped_damage(base: f64, critical: bool, limit: i32) -> i32 {
    let mut damage = if critical { base * 2.0 } else { base };
    if limit > 0 {
        damage = damage.min(f64::from(limit));
    }
    // `as` saturates on overflow and maps NaN to zero.
    damage as i32
}

// ── Damage messages ───────────────────────────────────────────────────────────

/// Builds the system messages both sides of a hit should see, paired with the
/// object id of the recipient.
pub fn damage_messages(
    attacker: &ActorCell,
    target: &ActorCell,
    damage: i32,
    critical: bool,
) -> Vec<(ObjectId, ServerPacket)> {
    let mut messages = Vec::with_capacity(3);
    if critical {
        messages.push((
            attacker.object_id,
            ServerPacket::SystemMessage(
                SystemMessage::new(SystemMessageId::C1LandedACriticalHit)
                    .with_param(MessageParam::CreatureName(attacker.name.clone())),
            ),
        ));
    }
    messages.push((
        attacker.object_id,
        ServerPacket::SystemMessage(
            SystemMessage::new(SystemMessageId::C1InflictedS3DamageOnC2)
                .with_param(MessageParam::CreatureName(attacker.name.clone()))
                .with_param(MessageParam::CreatureName(target.name.clone()))
                .with_param(MessageParam::Number(damage)),
        ),
    ));
    messages.push((
        target.object_id,
        ServerPacket::SystemMessage(
            SystemMessage::new(SystemMessageId::C1ReceivedS3DamageFromC2)
                .with_param(MessageParam::CreatureName(target.name.clone()))
                .with_param(MessageParam::CreatureName(attacker.name.clone()))
                .with_param(MessageParam::Number(damage)),
        ),
    ));
    messages
}

// ── Tests ─────────────────────────────────────────────────────────────────────
