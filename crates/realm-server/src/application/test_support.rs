//! Shared fixtures for the application-layer unit tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use realm_core::{standard_registry, InstanceType, ObjectId};

use crate::application::collaborators::{
    CombatContext, CombatRules, CombatantView, DataStore, Outcome, StoreError,
};
use crate::application::context::{ExecutionSettings, ServerContext};
use crate::application::records::{
    BaseStats, CharacterRecord, HennaTemplate, NpcSpawn, SkillTemplate,
};
use crate::application::session::Session;
use crate::application::world::{ActorCell, ActorState};

mock! {
    pub Store {}

    #[async_trait]
    impl DataStore for Store {
        async fn load_character(&self, object_id: ObjectId)
            -> Result<Option<CharacterRecord>, StoreError>;
        async fn henna(&self, symbol_id: i32) -> Result<Option<HennaTemplate>, StoreError>;
        async fn skill(&self, skill_id: i32) -> Result<Option<SkillTemplate>, StoreError>;
    }
}

mock! {
    pub Rules {}

    impl CombatRules for Rules {
        fn compute_outcome(
            &self,
            actor: &CombatantView,
            target: &CombatantView,
            ctx: &CombatContext,
        ) -> Outcome;
    }
}

pub const LOCK_TIMEOUT: Duration = Duration::from_millis(200);

pub fn context(
    rules: impl CombatRules + 'static,
    store: impl DataStore + 'static,
) -> Arc<ServerContext> {
    Arc::new(ServerContext::new(
        standard_registry().expect("registry"),
        InstanceType::build_taxonomy().expect("taxonomy"),
        Arc::new(rules),
        Arc::new(store),
        ExecutionSettings {
            lock_timeout: LOCK_TIMEOUT,
        },
    ))
}

pub fn session() -> Arc<Session> {
    Arc::new(Session::new("127.0.0.1:50000".parse().expect("addr"), 64))
}

pub fn player(object_id: ObjectId, name: &str) -> CharacterRecord {
    CharacterRecord {
        object_id,
        name: name.to_string(),
        kind: InstanceType::Player,
        level: 40,
        class_id: 93,
        max_hp: 1_000,
        p_atk: 100,
        p_def: 100,
        critical_rate: 0,
        damage_limit: 0,
        adena: 10_000,
        location_id: 1,
        hennas: Vec::new(),
        stats: BaseStats {
            int: 21,
            str: 40,
            con: 43,
            men: 20,
            dex: 30,
            wit: 11,
        },
    }
}

pub fn npc(object_id: ObjectId, kind: InstanceType, max_hp: i32) -> ActorCell {
    let spawn = NpcSpawn {
        object_id: Some(object_id),
        name: format!("{kind}{object_id}"),
        kind,
        level: 40,
        max_hp,
        p_atk: 100,
        p_def: 100,
        critical_rate: 0,
        damage_limit: 0,
    };
    ActorCell::new(object_id, kind, &spawn.name, ActorState::from_npc(&spawn))
}

/// Puts `record` in the world and makes `session` control it, the way a
/// successful character selection does.
pub async fn enter_world(
    ctx: &ServerContext,
    session: &Arc<Session>,
    record: &CharacterRecord,
) -> Arc<ActorCell> {
    ctx.sessions.insert(Arc::clone(session)).await;
    let cell = ctx.world.spawn(ActorCell::from_character(record)).await;
    assert!(ctx.sessions.bind_actor(record.object_id, session.id()).await);
    session.set_actor(Some(record.object_id));
    cell
}
