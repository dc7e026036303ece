//! Application layer of the game server.
//!
//! Everything here works on in-memory state and injected collaborators; no
//! sockets and no file system.  The infrastructure layer feeds it frame
//! bodies and drains the frames it produces.
//!
//! # Sub-modules
//!
//! - **`coordinator`** – opens and closes sessions and routes each inbound
//!   frame through the pipeline.
//! - **`inbound`** – the per-frame state machine: decode, validate, execute.
//! - **`outbound`** – turns queued server packets into wire frames.
//! - **`handlers`** – validate/execute pairs for every client packet.
//! - **`effects`** – instant skill effects applied under actor locks.
//! - **`session`** – per-connection state and the session table.
//! - **`world`** – actors, items and matching rooms with per-actor locks.
//! - **`collaborators`** – combat rules and data store interfaces.
//! - **`records`** – load-only records and templates.
//! - **`context`** – the shared state handed to every handler.

pub mod collaborators;
pub mod context;
pub mod coordinator;
pub mod effects;
pub mod handlers;
pub mod inbound;
pub mod outbound;
pub mod records;
pub mod session;
pub mod world;

#[cfg(test)]
pub(crate) mod test_support;
