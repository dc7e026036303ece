//! Realm wire protocol.
//!
//! - **`cursor`** – bounds-checked little-endian reader/writer for primitive
//!   fields and counted UTF-16 strings.
//! - **`codec`** – frame envelope (`[length:u16][body]`) and the protocol error type.
//! - **`opcode`** – generic bidirectional opcode registry with extended families.
//! - **`client_packets`** / **`server_packets`** – the closed packet catalog.
//! - **`catalog`** – the game's wire-id table and registry constructor.

pub mod catalog;
pub mod client_packets;
pub mod codec;
pub mod cursor;
pub mod opcode;
pub mod server_packets;

pub use codec::{decode_frame, encode_frame, ProtocolError};
pub use cursor::{PacketReader, PacketWriter};
