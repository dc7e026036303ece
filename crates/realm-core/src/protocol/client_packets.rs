//! Client → server packets.
//!
//! A client packet is a short-lived value: the inbound pipeline decodes one
//! per frame, validates it, executes it once, and drops it.  Each payload is
//! a plain struct whose fields are read in declaration order.

use crate::domain::ids::ObjectId;
use crate::protocol::codec::ProtocolError;
use crate::protocol::cursor::{PacketReader, PacketWriter};

/// Identity of every packet the server accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientPacketId {
    Logout,
    ConfirmTargetItem,
    Attack,
    SelectCharacter,
    MagicSkillUse,
    HennaItemRemoveInfo,
    JoinMatchingRoom,
    NetPing,
}

impl ClientPacketId {
    pub const ALL: [ClientPacketId; 8] = [
        ClientPacketId::Logout,
        ClientPacketId::ConfirmTargetItem,
        ClientPacketId::Attack,
        ClientPacketId::SelectCharacter,
        ClientPacketId::MagicSkillUse,
        ClientPacketId::HennaItemRemoveInfo,
        ClientPacketId::JoinMatchingRoom,
        ClientPacketId::NetPing,
    ];
}

// ── Payloads ──────────────────────────────────────────────────────────────────

/// Ask whether an item can be placed in the augmentation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmTargetItem {
    pub item_obj_id: ObjectId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attack {
    pub target_obj_id: ObjectId,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    /// Shift-click: attack without moving.
    pub shift: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectCharacter {
    pub char_obj_id: ObjectId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicSkillUse {
    pub skill_id: i32,
    pub target_obj_id: ObjectId,
    /// Forced use (ctrl held).  Sent as a 4-byte integer; any non-zero value is `true`.
    pub ctrl: bool,
    pub shift: bool,
}

/// Ask for the stat preview shown before removing a dye symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HennaItemRemoveInfo {
    pub symbol_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinMatchingRoom {
    pub room_id: i32,
}

/// Latency probe.  Carries the client's last measured round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetPing {
    pub request_id: i32,
    pub ping_ms: i32,
}

// ── ClientPacket ──────────────────────────────────────────────────────────────

/// One decoded client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPacket {
    Logout,
    ConfirmTargetItem(ConfirmTargetItem),
    Attack(Attack),
    SelectCharacter(SelectCharacter),
    MagicSkillUse(MagicSkillUse),
    HennaItemRemoveInfo(HennaItemRemoveInfo),
    JoinMatchingRoom(JoinMatchingRoom),
    NetPing(NetPing),
}

impl ClientPacket {
    /// Reads the payload for `id` from `reader`.
    ///
    /// The reader must be positioned just after the wire id.  Bytes left over
    /// after the last field are ignored.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::TruncatedFrame`] when the payload is short and
    /// [`ProtocolError::FieldOutOfRange`] for an invalid boolean.
    pub fn decode(id: ClientPacketId, reader: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        let packet = match id {
            ClientPacketId::Logout => ClientPacket::Logout,
            ClientPacketId::ConfirmTargetItem => ClientPacket::ConfirmTargetItem(ConfirmTargetItem {
                item_obj_id: reader.read_i32()?,
            }),
            ClientPacketId::Attack => ClientPacket::Attack(Attack {
                target_obj_id: reader.read_i32()?,
                x: reader.read_i32()?,
                y: reader.read_i32()?,
                z: reader.read_i32()?,
                shift: reader.read_bool()?,
            }),
            ClientPacketId::SelectCharacter => ClientPacket::SelectCharacter(SelectCharacter {
                char_obj_id: reader.read_i32()?,
            }),
            ClientPacketId::MagicSkillUse => ClientPacket::MagicSkillUse(MagicSkillUse {
                skill_id: reader.read_i32()?,
                target_obj_id: reader.read_i32()?,
                ctrl: reader.read_i32()? != 0,
                shift: reader.read_bool()?,
            }),
            ClientPacketId::HennaItemRemoveInfo => {
                ClientPacket::HennaItemRemoveInfo(HennaItemRemoveInfo {
                    symbol_id: reader.read_i32()?,
                })
            }
            ClientPacketId::JoinMatchingRoom => ClientPacket::JoinMatchingRoom(JoinMatchingRoom {
                room_id: reader.read_i32()?,
            }),
            ClientPacketId::NetPing => ClientPacket::NetPing(NetPing {
                request_id: reader.read_i32()?,
                ping_ms: reader.read_i32()?,
            }),
        };
        Ok(packet)
    }

    /// Writes the payload (without wire id).  Used by test clients and tools.
    pub fn encode_payload(&self, writer: &mut PacketWriter) {
        match self {
            ClientPacket::Logout => {}
            ClientPacket::ConfirmTargetItem(p) => {
                writer.write_i32(p.item_obj_id);
            }
            ClientPacket::Attack(p) => {
                writer
                    .write_i32(p.target_obj_id)
                    .write_i32(p.x)
                    .write_i32(p.y)
                    .write_i32(p.z)
                    .write_bool(p.shift);
            }
            ClientPacket::SelectCharacter(p) => {
                writer.write_i32(p.char_obj_id);
            }
            ClientPacket::MagicSkillUse(p) => {
                writer
                    .write_i32(p.skill_id)
                    .write_i32(p.target_obj_id)
                    .write_i32(i32::from(p.ctrl))
                    .write_bool(p.shift);
            }
            ClientPacket::HennaItemRemoveInfo(p) => {
                writer.write_i32(p.symbol_id);
            }
            ClientPacket::JoinMatchingRoom(p) => {
                writer.write_i32(p.room_id);
            }
            ClientPacket::NetPing(p) => {
                writer.write_i32(p.request_id).write_i32(p.ping_ms);
            }
        }
    }

    pub fn id(&self) -> ClientPacketId {
        match self {
            ClientPacket::Logout => ClientPacketId::Logout,
            ClientPacket::ConfirmTargetItem(_) => ClientPacketId::ConfirmTargetItem,
            ClientPacket::Attack(_) => ClientPacketId::Attack,
            ClientPacket::SelectCharacter(_) => ClientPacketId::SelectCharacter,
            ClientPacket::MagicSkillUse(_) => ClientPacketId::MagicSkillUse,
            ClientPacket::HennaItemRemoveInfo(_) => ClientPacketId::HennaItemRemoveInfo,
            ClientPacket::JoinMatchingRoom(_) => ClientPacketId::JoinMatchingRoom,
            ClientPacket::NetPing(_) => ClientPacketId::NetPing,
        }
    }
}
