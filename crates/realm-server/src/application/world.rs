//! In-memory world state shared by every session.
//!
//! # Locking model
//!
//! The world has two levels of locking:
//!
//! 1. The object maps (`actors`, `items`, `rooms`) sit behind
//!    `tokio::sync::RwLock`s.  They are held only long enough to look up,
//!    insert or remove an entry, never across an `.await` on anything else.
//! 2. Each actor's mutable [`ActorState`] sits behind its own
//!    `tokio::sync::Mutex` inside an [`ActorCell`].  Handlers lock the actors
//!    they touch with a timeout ([`ActorCell::lock`]); when two actors are
//!    involved, [`lock_pair`] always acquires them in ascending object-id order
//!    so two sessions can never deadlock each other.
//!
//! Tokio's mutex is fair, so concurrent hits on the same target are applied
//! one after the other in the order they asked for the lock.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use realm_core::protocol::server_packets::RoomMemberType;
use realm_core::{InstanceType, ObjectId, ObjectIdAllocator};
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::application::collaborators::StoreError;
use crate::application::records::{BaseStats, CharacterRecord, ItemRecord, NpcSpawn, RoomRecord};

/// Failure of an execute step after validation succeeded.
///
/// The packet is abandoned, but the connection stays up.
#[derive(Debug, Error)]
pub enum ExecutionFault {
    #[error("timed out after {waited:?} waiting for the lock on object {object_id}")]
    LockTimeout { object_id: ObjectId, waited: Duration },

    #[error("object {0} cannot be locked against itself")]
    SelfLock(ObjectId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("execution panicked: {0}")]
    Panicked(String),
}

// ── Actors ────────────────────────────────────────────────────────────────────

/// Mutable state of one actor, guarded by the mutex in its [`ActorCell`].
#[derive(Debug, Clone, PartialEq)]
pub struct ActorState {
    pub level: i32,
    pub class_id: i32,
    pub current_hp: i32,
    pub max_hp: i32,
    pub p_atk: i32,
    pub p_def: i32,
    pub critical_rate: i32,
    /// Upper bound on a single hit taken; `0` means unlimited.
    pub damage_limit: i32,
    pub dead: bool,
    /// Skill currently being cast.
    pub casting: Option<i32>,
    /// Current attack target.
    pub attacking: Option<ObjectId>,
    pub over_hit_enabled: bool,
    pub stats: BaseStats,
    pub hennas: Vec<i32>,
    pub adena: i64,
    pub location_id: i32,
}

impl ActorState {
    pub fn from_character(record: &CharacterRecord) -> Self {
        Self {
            level: record.level,
            class_id: record.class_id,
            current_hp: record.max_hp,
            max_hp: record.max_hp,
            p_atk: record.p_atk,
            p_def: record.p_def,
            critical_rate: record.critical_rate,
            damage_limit: record.damage_limit,
            dead: false,
            casting: None,
            attacking: None,
            over_hit_enabled: false,
            stats: record.stats,
            hennas: record.hennas.clone(),
            adena: record.adena,
            location_id: record.location_id,
        }
    }

    pub fn from_npc(spawn: &NpcSpawn) -> Self {
        Self {
            level: spawn.level,
            class_id: 0,
            current_hp: spawn.max_hp,
            max_hp: spawn.max_hp,
            p_atk: spawn.p_atk,
            p_def: spawn.p_def,
            critical_rate: spawn.critical_rate,
            damage_limit: spawn.damage_limit,
            dead: false,
            casting: None,
            attacking: None,
            over_hit_enabled: false,
            stats: BaseStats::default(),
            hennas: Vec::new(),
            adena: 0,
            location_id: 0,
        }
    }

    /// Subtracts up to `damage` hit points and returns how many were removed.
    ///
    /// Reaching zero marks the actor dead and clears its attack and cast.
    /// A dead actor takes no damage.
    pub fn reduce_hp(&mut self, damage: i32) -> i32 {
        if self.dead {
            return 0;
        }
        let applied = damage.clamp(0, self.current_hp);
        self.current_hp -= applied;
        if self.current_hp == 0 {
            self.dead = true;
            self.casting = None;
            self.attacking = None;
        }
        applied
    }

    /// Returns `true` if an attack was in progress.
    pub fn break_attack(&mut self) -> bool {
        self.attacking.take().is_some()
    }

    /// Returns `true` if a cast was in progress.
    pub fn break_cast(&mut self) -> bool {
        self.casting.take().is_some()
    }
}

/// Immutable identity of an actor plus its lock-protected state.
#[derive(Debug)]
pub struct ActorCell {
    pub object_id: ObjectId,
    pub kind: InstanceType,
    pub name: String,
    state: Mutex<ActorState>,
}

impl ActorCell {
    pub fn new(object_id: ObjectId, kind: InstanceType, name: impl Into<String>, state: ActorState) -> Self {
        Self {
            object_id,
            kind,
            name: name.into(),
            state: Mutex::new(state),
        }
    }

    pub fn from_character(record: &CharacterRecord) -> Self {
        Self::new(record.object_id, record.kind, &record.name, ActorState::from_character(record))
    }

    /// Locks this actor's state, giving up after `wait`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionFault::LockTimeout`] when the lock is not acquired in time.
    pub async fn lock(&self, wait: Duration) -> Result<MutexGuard<'_, ActorState>, ExecutionFault> {
        timeout(wait, self.state.lock())
            .await
            .map_err(|_| ExecutionFault::LockTimeout {
                object_id: self.object_id,
                waited: wait,
            })
    }

    /// Non-blocking peek used by validation.  Returns `None` while an execute
    /// step holds the lock.
    pub fn try_state(&self) -> Option<MutexGuard<'_, ActorState>> {
        self.state.try_lock().ok()
    }
}

/// Locks two distinct actors in ascending object-id order and returns the
/// guards in argument order.
///
/// # Errors
///
/// Returns [`ExecutionFault::SelfLock`] when both cells are the same actor, and
/// [`ExecutionFault::LockTimeout`] when either lock is not acquired within `wait`.
pub async fn lock_pair<'a>(
    first: &'a ActorCell,
    second: &'a ActorCell,
    wait: Duration,
) -> Result<(MutexGuard<'a, ActorState>, MutexGuard<'a, ActorState>), ExecutionFault> {
    if first.object_id == second.object_id {
        return Err(ExecutionFault::SelfLock(first.object_id));
    }
    if first.object_id < second.object_id {
        let a = first.lock(wait).await?;
        let b = second.lock(wait).await?;
        Ok((a, b))
    } else {
        let b = second.lock(wait).await?;
        let a = first.lock(wait).await?;
        Ok((a, b))
    }
}

// ── Matching rooms ────────────────────────────────────────────────────────────

/// A party-matching room.  The first member to join becomes leader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchingRoom {
    pub id: i32,
    pub leader: Option<ObjectId>,
    pub members: Vec<ObjectId>,
}

impl MatchingRoom {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            leader: None,
            members: Vec::new(),
        }
    }

    pub fn member_type(&self, object_id: ObjectId) -> RoomMemberType {
        if self.leader == Some(object_id) {
            RoomMemberType::Leader
        } else if self.members.contains(&object_id) {
            RoomMemberType::Member
        } else {
            RoomMemberType::Waiting
        }
    }

    fn join(&mut self, object_id: ObjectId) {
        if !self.members.contains(&object_id) {
            self.members.push(object_id);
        }
        if self.leader.is_none() {
            self.leader = Some(object_id);
        }
    }

    /// Returns `true` if `object_id` was a member.
    fn leave(&mut self, object_id: ObjectId) -> bool {
        let before = self.members.len();
        self.members.retain(|&m| m != object_id);
        if self.leader == Some(object_id) {
            self.leader = self.members.first().copied();
        }
        self.members.len() != before
    }
}

// ── World ─────────────────────────────────────────────────────────────────────

/// A deep copy of the whole world, for comparing before/after states in tests
/// and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    pub actors: BTreeMap<ObjectId, (InstanceType, String, ActorState)>,
    pub items: BTreeMap<ObjectId, ItemRecord>,
    pub rooms: BTreeMap<i32, MatchingRoom>,
}

#[derive(Debug, Default)]
pub struct World {
    actors: RwLock<HashMap<ObjectId, Arc<ActorCell>>>,
    items: RwLock<HashMap<ObjectId, ItemRecord>>,
    rooms: RwLock<BTreeMap<i32, MatchingRoom>>,
    ids: ObjectIdAllocator,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh runtime object id.
    pub fn next_object_id(&self) -> ObjectId {
        self.ids.next()
    }

    /// Places boot-time NPCs, items and matching rooms.
    pub async fn populate(&self, npcs: &[NpcSpawn], items: &[ItemRecord], rooms: &[RoomRecord]) {
        for npc in npcs {
            let object_id = npc.object_id.unwrap_or_else(|| self.next_object_id());
            let cell = ActorCell::new(object_id, npc.kind, &npc.name, ActorState::from_npc(npc));
            if self.try_spawn(cell).await.is_none() {
                warn!(object_id, name = %npc.name, "npc id already taken; spawn skipped");
            }
        }
        for item in items {
            self.insert_item(item.clone()).await;
        }
        for room in rooms {
            self.create_room(room.room_id).await;
        }
        debug!(
            npcs = npcs.len(),
            items = items.len(),
            rooms = rooms.len(),
            "world populated"
        );
    }

    // ── Actors ────────────────────────────────────────────────────────────────

    pub async fn actor(&self, object_id: ObjectId) -> Option<Arc<ActorCell>> {
        self.actors.read().await.get(&object_id).cloned()
    }

    /// Inserts `cell` unless an actor with the same id is already present, and
    /// returns whichever cell is now in the world.
    pub async fn spawn(&self, cell: ActorCell) -> Arc<ActorCell> {
        let mut actors = self.actors.write().await;
        Arc::clone(
            actors
                .entry(cell.object_id)
                .or_insert_with(|| Arc::new(cell)),
        )
    }

    /// Inserts `cell` only if its id is free.  Returns `None`, leaving the
    /// world unchanged, when another actor already holds the id.
    pub async fn try_spawn(&self, cell: ActorCell) -> Option<Arc<ActorCell>> {
        let mut actors = self.actors.write().await;
        match actors.entry(cell.object_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => Some(Arc::clone(slot.insert(Arc::new(cell)))),
        }
    }

    pub async fn despawn(&self, object_id: ObjectId) -> Option<Arc<ActorCell>> {
        self.actors.write().await.remove(&object_id)
    }

    pub async fn actor_count(&self) -> usize {
        self.actors.read().await.len()
    }

    // ── Items ─────────────────────────────────────────────────────────────────

    pub async fn item(&self, object_id: ObjectId) -> Option<ItemRecord> {
        self.items.read().await.get(&object_id).cloned()
    }

    pub async fn insert_item(&self, item: ItemRecord) {
        self.items.write().await.insert(item.object_id, item);
    }

    // ── Rooms ─────────────────────────────────────────────────────────────────

    /// Returns `false` if the room already exists.
    pub async fn create_room(&self, room_id: i32) -> bool {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room_id) {
            return false;
        }
        rooms.insert(room_id, MatchingRoom::new(room_id));
        true
    }

    pub async fn room(&self, room_id: i32) -> Option<MatchingRoom> {
        self.rooms.read().await.get(&room_id).cloned()
    }

    /// Adds `object_id` to the room and returns the room's new state, or `None`
    /// if the room does not exist.
    pub async fn join_room(&self, room_id: i32, object_id: ObjectId) -> Option<MatchingRoom> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&room_id)?;
        room.join(object_id);
        Some(room.clone())
    }

    /// Removes `object_id` from every room and returns the rooms it left, in
    /// their new state.
    pub async fn leave_rooms(&self, object_id: ObjectId) -> Vec<MatchingRoom> {
        let mut rooms = self.rooms.write().await;
        rooms
            .values_mut()
            .filter_map(|room| room.leave(object_id).then(|| room.clone()))
            .collect()
    }

    /// Copies the whole world.  Waits for every actor lock in turn.
    pub async fn snapshot(&self) -> WorldSnapshot {
        let cells: Vec<Arc<ActorCell>> = self.actors.read().await.values().cloned().collect();
        let mut actors = BTreeMap::new();
        for cell in cells {
            let state = cell.state.lock().await.clone();
            actors.insert(cell.object_id, (cell.kind, cell.name.clone(), state));
        }
        let items = self
            .items
            .read()
            .await
            .iter()
            .map(|(id, item)| (*id, item.clone()))
            .collect();
        let rooms = self.rooms.read().await.clone();
        WorldSnapshot { actors, items, rooms }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
