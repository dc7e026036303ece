//! Per-connection sessions and the table that indexes them.
//!
//! A [`Session`] owns the outbound queue for one connection.  Any code (packet
//! handlers, effects, broadcasts from other sessions) may call
//! [`Session::send`]; the connection's send loop is woken through a
//! [`Notify`] and drains the queue in FIFO order.
//!
//! The queue sits behind a `std::sync::Mutex` because `send` must be callable
//! from synchronous code that is holding actor locks.  The critical sections
//! are a handful of `VecDeque` operations and never await.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use realm_core::{ObjectId, ServerPacket};
use tokio::sync::{Notify, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// Unique identifier for one connection's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Default)]
struct SessionState {
    actor: Option<ObjectId>,
    queue: VecDeque<ServerPacket>,
    closed: bool,
    last_ping_ms: Option<i32>,
}

// ── Session ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    max_pending: usize,
    state: Mutex<SessionState>,
    outbound_ready: Notify,
    shutdown: Notify,
}

impl Session {
    pub fn new(peer: SocketAddr, max_pending: usize) -> Self {
        Self {
            id: SessionId::new(),
            peer,
            max_pending,
            state: Mutex::new(SessionState::default()),
            outbound_ready: Notify::new(),
            shutdown: Notify::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues `packet` for this session.
    ///
    /// Returns `false` when the packet was discarded: either the session is
    /// already closed, or the queue overflowed and the session has just been
    /// closed as a slow consumer.
    pub fn send(&self, packet: ServerPacket) -> bool {
        let mut state = self.state();
        if state.closed {
            debug!(session = %self.id, packet = ?packet.id(), "discarding packet for closed session");
            return false;
        }
        state.queue.push_back(packet);
        if state.queue.len() > self.max_pending {
            warn!(
                session = %self.id,
                pending = state.queue.len(),
                "outbound queue overflow; closing slow consumer"
            );
            state.closed = true;
            state.queue.clear();
            drop(state);
            self.wake_all();
            return false;
        }
        drop(state);
        self.outbound_ready.notify_one();
        true
    }

    /// Removes and returns everything queued, oldest first.
    pub fn take_pending(&self) -> Vec<ServerPacket> {
        self.state().queue.drain(..).collect()
    }

    pub fn pending_len(&self) -> usize {
        self.state().queue.len()
    }

    /// Closes the session and discards its queue.  Returns `true` only for
    /// the call that actually closed it.
    pub fn close(&self) -> bool {
        let mut state = self.state();
        if state.closed {
            return false;
        }
        state.closed = true;
        state.queue.clear();
        drop(state);
        self.wake_all();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// The character this session controls, if one is selected.
    pub fn actor(&self) -> Option<ObjectId> {
        self.state().actor
    }

    pub fn set_actor(&self, actor: Option<ObjectId>) {
        self.state().actor = actor;
    }

    pub fn record_ping(&self, ping_ms: i32) {
        self.state().last_ping_ms = Some(ping_ms);
    }

    pub fn last_ping_ms(&self) -> Option<i32> {
        self.state().last_ping_ms
    }

    /// Resolves when a packet has been queued since the last drain, or the
    /// session was closed.
    pub async fn outbound_ready(&self) {
        self.outbound_ready.notified().await;
    }

    /// Resolves once the session is closed.
    pub async fn closed(&self) {
        loop {
            let notified = self.shutdown.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }

    fn wake_all(&self) {
        self.outbound_ready.notify_one();
        self.shutdown.notify_waiters();
    }
}

// ── Session table ─────────────────────────────────────────────────────────────

/// All open sessions, plus the character → session binding.
///
/// A character is bound to at most one session; [`bind_actor`](Self::bind_actor)
/// is the single point where that is enforced.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    by_actor: RwLock<HashMap<ObjectId, SessionId>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Arc<Session>) {
        self.sessions.write().await.insert(session.id(), session);
    }

    pub async fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(&id)
    }

    pub async fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// The session currently controlling `object_id`.
    pub async fn session_for_actor(&self, object_id: ObjectId) -> Option<Arc<Session>> {
        let id = *self.by_actor.read().await.get(&object_id)?;
        self.get(id).await
    }

    /// Binds `object_id` to `session`.  Returns `false`, changing nothing, if
    /// the character is already bound to any session.
    pub async fn bind_actor(&self, object_id: ObjectId, session: SessionId) -> bool {
        let mut by_actor = self.by_actor.write().await;
        if by_actor.contains_key(&object_id) {
            return false;
        }
        by_actor.insert(object_id, session);
        true
    }

    /// Removes the binding, but only if it belongs to `session`.
    pub async fn unbind_actor(&self, object_id: ObjectId, session: SessionId) -> bool {
        let mut by_actor = self.by_actor.write().await;
        if by_actor.get(&object_id) == Some(&session) {
            by_actor.remove(&object_id);
            return true;
        }
        false
    }

    /// Queues `packet` on whichever session controls `object_id`.  Returns
    /// `false` if nobody does or the packet was discarded.
    pub async fn send_to_actor(&self, object_id: ObjectId, packet: ServerPacket) -> bool {
        match self.session_for_actor(object_id).await {
            Some(session) => session.send(packet),
            None => false,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
