//! # realm-core
//!
//! Shared library for the Realm game server containing the binary wire
//! protocol, the opcode registry, the packet catalog, and the entity-type
//! taxonomy.
//!
//! This crate has no dependencies on sockets, async runtimes, or storage.
//! Everything in it is deterministic and can be tested in isolation.
//!
//! # Architecture overview
//!
//! - **`protocol`** – How bytes travel over the network.  A frame is
//!   `[length:u16][opcode][payload]`; the [`protocol::cursor`] module reads and
//!   writes the primitive fields, [`protocol::opcode`] maps wire opcodes
//!   (including multi-level "extended" opcodes) to packet identities, and the
//!   packet modules define every client command and server notification.
//!
//! - **`domain`** – The closed classification of world objects
//!   ([`domain::instance_type::InstanceType`]) backed by a generic tag registry
//!   with precomputed ancestor masks, plus the object-id allocator.

pub mod domain;
pub mod protocol;

pub use domain::ids::{ObjectId, ObjectIdAllocator};
pub use domain::instance_type::InstanceType;
pub use domain::taxonomy::{ConfigurationError, TagId, Taxonomy, TypeRegistry};
pub use protocol::catalog::{standard_registry, PacketRegistry};
pub use protocol::client_packets::{ClientPacket, ClientPacketId};
pub use protocol::codec::{decode_frame, encode_frame, ProtocolError};
pub use protocol::cursor::{PacketReader, PacketWriter};
pub use protocol::opcode::{OpcodeRegistry, OpcodeRegistryBuilder, Resolution, WireId};
pub use protocol::server_packets::{ServerPacket, ServerPacketId};
