//! Shared server state handed to every pipeline stage and handler.

use std::sync::Arc;
use std::time::Duration;

use realm_core::{InstanceType, PacketRegistry, Taxonomy};

use crate::application::collaborators::{CombatRules, DataStore};
use crate::application::session::SessionTable;
use crate::application::world::World;

/// Tunables for the execute stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionSettings {
    /// How long an execute step waits for an actor lock before faulting.
    pub lock_timeout: Duration,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(500),
        }
    }
}

/// Everything a packet handler may touch.
///
/// The registry and taxonomy are immutable after boot; the world and session
/// table carry their own locks.
pub struct ServerContext {
    pub registry: PacketRegistry,
    pub taxonomy: Taxonomy,
    pub world: World,
    pub sessions: SessionTable,
    pub rules: Arc<dyn CombatRules>,
    pub store: Arc<dyn DataStore>,
    pub settings: ExecutionSettings,
}

impl ServerContext {
    pub fn new(
        registry: PacketRegistry,
        taxonomy: Taxonomy,
        rules: Arc<dyn CombatRules>,
        store: Arc<dyn DataStore>,
        settings: ExecutionSettings,
    ) -> Self {
        Self {
            registry,
            taxonomy,
            world: World::new(),
            sessions: SessionTable::new(),
            rules,
            store,
            settings,
        }
    }

    /// Taxonomy membership test: is `kind` a `query`?
    pub fn is_kind(&self, kind: InstanceType, query: InstanceType) -> bool {
        self.taxonomy.is_type(kind.tag(), query.tag())
    }
}
