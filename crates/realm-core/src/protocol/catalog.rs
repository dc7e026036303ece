//! The game's wire-id table.
//!
//! `0xD0` is the extended client family and `0xFE` the extended server
//! family.  `D0:0051` is further split by a 4-byte tertiary id.

use crate::domain::taxonomy::ConfigurationError;
use crate::protocol::client_packets::{ClientPacket, ClientPacketId};
use crate::protocol::codec::{encode_frame, ProtocolError};
use crate::protocol::cursor::{PacketReader, PacketWriter};
use crate::protocol::opcode::{OpcodeRegistry, Resolution, WireId};
use crate::protocol::server_packets::{ServerPacket, ServerPacketId};

/// Registry specialised to the game catalog.
pub type PacketRegistry = OpcodeRegistry<ClientPacketId, ServerPacketId>;

pub const CLIENT_WIRE_IDS: [(ClientPacketId, WireId); 8] = [
    (ClientPacketId::Logout, WireId::single(0x00)),
    (ClientPacketId::ConfirmTargetItem, WireId::single(0x01)),
    (ClientPacketId::Attack, WireId::single(0x0A)),
    (ClientPacketId::SelectCharacter, WireId::single(0x12)),
    (ClientPacketId::MagicSkillUse, WireId::single(0x39)),
    (ClientPacketId::HennaItemRemoveInfo, WireId::single(0x71)),
    (ClientPacketId::JoinMatchingRoom, WireId::extended(0xD0, 0x009D)),
    (ClientPacketId::NetPing, WireId::nested(0xD0, 0x0051, 0x0000_0001)),
];

pub const SERVER_WIRE_IDS: [(ServerPacketId, WireId); 10] = [
    (ServerPacketId::CharSelected, WireId::single(0x0B)),
    (ServerPacketId::StatusUpdate, WireId::single(0x18)),
    (ServerPacketId::ActionFailed, WireId::single(0x1F)),
    (ServerPacketId::AttackResult, WireId::single(0x33)),
    (ServerPacketId::MagicSkillUse, WireId::single(0x48)),
    (ServerPacketId::SystemMessage, WireId::single(0x62)),
    (ServerPacketId::LeaveWorld, WireId::single(0x84)),
    (ServerPacketId::HennaItemRemoveInfo, WireId::single(0xE7)),
    (ServerPacketId::ExPutItemResultForVariationMake, WireId::extended(0xFE, 0x0053)),
    (ServerPacketId::ExMpccRoomMember, WireId::extended(0xFE, 0x00A0)),
];

/// Builds the registry for the full catalog.
///
/// Every [`ServerPacketId`] is required to have a wire id, so a packet the
/// server could construct but never send is caught at boot.
///
/// # Errors
///
/// Any [`ConfigurationError`] from [`OpcodeRegistryBuilder::build`](crate::protocol::opcode::OpcodeRegistryBuilder::build).
pub fn standard_registry() -> Result<PacketRegistry, ConfigurationError> {
    let builder = CLIENT_WIRE_IDS
        .iter()
        .fold(PacketRegistry::builder(), |b, (id, wire)| b.inbound(*wire, *id));
    SERVER_WIRE_IDS
        .iter()
        .fold(builder, |b, (id, wire)| b.outbound(*id, *wire))
        .require_outbound(&ServerPacketId::ALL)
        .build()
}

/// Encodes a client packet as a complete frame.  Test clients and load tools
/// use this; the server itself only decodes client packets.
pub fn encode_client_frame(registry: &PacketRegistry, packet: &ClientPacket) -> Result<Vec<u8>, ProtocolError> {
    let wire = registry
        .inbound_wire_of(packet.id())
        .ok_or_else(|| ProtocolError::UnregisteredPacket(format!("{:?}", packet.id())))?;
    let mut w = PacketWriter::new();
    wire.write(&mut w);
    packet.encode_payload(&mut w);
    encode_frame(w.as_slice())
}

/// Decodes a server frame body (wire id + payload).  Returns `Ok(None)` for a
/// wire id the registry does not know.
pub fn decode_server_body(registry: &PacketRegistry, body: &[u8]) -> Result<Option<ServerPacket>, ProtocolError> {
    let mut reader = PacketReader::new(body);
    let primary = reader.read_u8()?;
    let single = WireId::single(primary);
    if let Some(id) = registry.resolve_outbound(&single) {
        return ServerPacket::decode(id, &mut reader).map(Some);
    }
    let secondary = match reader.read_u16() {
        Ok(secondary) => secondary,
        Err(_) => return Ok(None),
    };
    match registry.resolve_outbound(&WireId::extended(primary, secondary)) {
        Some(id) => ServerPacket::decode(id, &mut reader).map(Some),
        None => Ok(None),
    }
}

/// Convenience for log lines: the wire id a client frame body starts with.
pub fn peek_client_wire(registry: &PacketRegistry, body: &[u8]) -> Option<WireId> {
    match registry.read_inbound(&mut PacketReader::new(body)).ok()? {
        Resolution::Known(id) => registry.inbound_wire_of(id),
        Resolution::Unknown(wire) => Some(wire),
    }
}
