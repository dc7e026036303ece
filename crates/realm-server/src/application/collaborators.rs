//! Interfaces to the collaborators the server consumes but does not own.
//!
//! Combat formulas and persistence live outside the communication core.  The
//! core only needs two seams:
//!
//! - [`CombatRules`] – a pure function from two combatants and an action to
//!   an [`Outcome`].
//! - [`DataStore`] – load-only lookups of characters and templates by their
//!   stable ids.
//!
//! Both are injected into [`ServerContext`](crate::application::context::ServerContext)
//! as trait objects so tests can swap in mocks.

use async_trait::async_trait;
use realm_core::{InstanceType, ObjectId};
use thiserror::Error;

use crate::application::records::{CharacterRecord, HennaTemplate, SkillTemplate};
use crate::application::world::{ActorCell, ActorState};

// ── Combat ────────────────────────────────────────────────────────────────────

/// A read-only copy of the combat-relevant fields of one actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombatantView {
    pub object_id: ObjectId,
    pub kind: InstanceType,
    pub level: i32,
    pub p_atk: i32,
    pub p_def: i32,
    pub critical_rate: i32,
    pub current_hp: i32,
    pub max_hp: i32,
}

impl CombatantView {
    /// Snapshots `state` for the actor identified by `cell`.
    pub fn of(cell: &ActorCell, state: &ActorState) -> Self {
        Self {
            object_id: cell.object_id,
            kind: cell.kind,
            level: state.level,
            p_atk: state.p_atk,
            p_def: state.p_def,
            critical_rate: state.critical_rate,
            current_hp: state.current_hp,
            max_hp: state.max_hp,
        }
    }
}

/// What the attacker is doing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CombatAction {
    MeleeAttack,
    Blow {
        power: f64,
        chance: f64,
        critical_chance: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombatContext {
    pub action: CombatAction,
}

/// Result of one combat resolution, before critical doubling and damage caps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
    pub landed: bool,
    pub damage: f64,
    pub critical: bool,
    /// The hit interrupts the target's attack and cast.
    pub breaks_action: bool,
}

impl Outcome {
    pub const MISS: Outcome = Outcome {
        landed: false,
        damage: 0.0,
        critical: false,
        breaks_action: false,
    };
}

/// Combat formulas.  Implementations must be pure: the same inputs always
/// yield the same [`Outcome`], and nothing is mutated.
pub trait CombatRules: Send + Sync {
    fn compute_outcome(
        &self,
        actor: &CombatantView,
        target: &CombatantView,
        ctx: &CombatContext,
    ) -> Outcome;
}

/// Flat deterministic formulas for running the server without a rules engine.
///
/// - Melee always lands for `70 × p.atk / p.def` and crits when the attacker's
///   critical rate reaches [`Self::THRESHOLD`].
/// - A blow lands when its chance reaches the threshold, crits likewise, and
///   adds its power to p.atk.
/// - Any landed hit breaks the target's action.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCombatRules;

impl StandardCombatRules {
    /// Percent at or above which a chance roll succeeds.
    pub const THRESHOLD: f64 = 50.0;

    fn base_damage(attack: f64, p_def: i32) -> f64 {
        (70.0 * attack / f64::from(p_def.max(1))).max(1.0)
    }
}

impl CombatRules for StandardCombatRules {
    fn compute_outcome(
        &self,
        actor: &CombatantView,
        target: &CombatantView,
        ctx: &CombatContext,
    ) -> Outcome {
        match ctx.action {
            CombatAction::MeleeAttack => Outcome {
                landed: true,
                damage: Self::base_damage(f64::from(actor.p_atk), target.p_def),
                critical: f64::from(actor.critical_rate) >= Self::THRESHOLD,
                breaks_action: true,
            },
            CombatAction::Blow {
                power,
                chance,
                critical_chance,
            } => {
                if chance < Self::THRESHOLD {
                    return Outcome::MISS;
                }
                Outcome {
                    landed: true,
                    damage: Self::base_damage(f64::from(actor.p_atk) + power, target.p_def),
                    critical: critical_chance >= Self::THRESHOLD,
                    breaks_action: true,
                }
            }
        }
    }
}

// ── Persistence ───────────────────────────────────────────────────────────────

/// Error type for data store lookups.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("data store unavailable: {0}")]
    Unavailable(String),
}

/// Load-only access to persisted characters and static templates.
///
/// `Ok(None)` means the id is not known; `Err` means the store itself failed.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn load_character(&self, object_id: ObjectId)
        -> Result<Option<CharacterRecord>, StoreError>;

    async fn henna(&self, symbol_id: i32) -> Result<Option<HennaTemplate>, StoreError>;

    async fn skill(&self, skill_id: i32) -> Result<Option<SkillTemplate>, StoreError>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
