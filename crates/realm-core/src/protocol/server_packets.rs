//! Server → client packets.
//!
//! Every packet here is a *snapshot*: it owns copies of the values it will put
//! on the wire, taken when the packet is constructed.  Nothing holds a
//! reference back into the world, so a packet that sits in a send queue while
//! its source object keeps changing still serializes exactly what was true at
//! construction time.

use crate::domain::ids::ObjectId;
use crate::protocol::codec::ProtocolError;
use crate::protocol::cursor::{PacketReader, PacketWriter};

/// Identity of every packet the server sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerPacketId {
    CharSelected,
    StatusUpdate,
    ActionFailed,
    AttackResult,
    MagicSkillUse,
    SystemMessage,
    LeaveWorld,
    HennaItemRemoveInfo,
    ExPutItemResultForVariationMake,
    ExMpccRoomMember,
}

impl ServerPacketId {
    pub const ALL: [ServerPacketId; 10] = [
        ServerPacketId::CharSelected,
        ServerPacketId::StatusUpdate,
        ServerPacketId::ActionFailed,
        ServerPacketId::AttackResult,
        ServerPacketId::MagicSkillUse,
        ServerPacketId::SystemMessage,
        ServerPacketId::LeaveWorld,
        ServerPacketId::HennaItemRemoveInfo,
        ServerPacketId::ExPutItemResultForVariationMake,
        ServerPacketId::ExMpccRoomMember,
    ];
}

// ── System messages ───────────────────────────────────────────────────────────

/// Client-side message table ids used by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SystemMessageId {
    TargetIsIncorrect = 144,
    ThisIsNotASuitableItem = 1960,
    OnceAnItemIsAugmentedItCannotBeAugmentedAgain = 1970,
    C1LandedACriticalHit = 2266,
    C1InflictedS3DamageOnC2 = 2261,
    C1ReceivedS3DamageFromC2 = 2262,
}

impl SystemMessageId {
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        use SystemMessageId::*;
        [
            TargetIsIncorrect,
            ThisIsNotASuitableItem,
            OnceAnItemIsAugmentedItCannotBeAugmentedAgain,
            C1LandedACriticalHit,
            C1InflictedS3DamageOnC2,
            C1ReceivedS3DamageFromC2,
        ]
        .into_iter()
        .find(|id| id.code() == code)
    }
}

/// A typed substitution parameter of a system message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageParam {
    Text(String),
    Number(i32),
    Long(i64),
    ItemName(i32),
    SkillName { skill_id: i32, level: i32 },
    /// Name of a player or npc, resolved server-side.
    CreatureName(String),
}

impl MessageParam {
    fn type_code(&self) -> i32 {
        match self {
            MessageParam::Text(_) => 0,
            MessageParam::Number(_) => 1,
            MessageParam::ItemName(_) => 3,
            MessageParam::SkillName { .. } => 4,
            MessageParam::Long(_) => 6,
            MessageParam::CreatureName(_) => 12,
        }
    }

    fn encode(&self, w: &mut PacketWriter) {
        w.write_i32(self.type_code());
        match self {
            MessageParam::Text(text) | MessageParam::CreatureName(text) => {
                w.write_string(text);
            }
            MessageParam::Number(value) | MessageParam::ItemName(value) => {
                w.write_i32(*value);
            }
            MessageParam::Long(value) => {
                w.write_i64(*value);
            }
            MessageParam::SkillName { skill_id, level } => {
                w.write_i32(*skill_id).write_i32(*level);
            }
        }
    }

    fn decode(r: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        let param = match r.read_i32()? {
            0 => MessageParam::Text(r.read_string()?),
            1 => MessageParam::Number(r.read_i32()?),
            3 => MessageParam::ItemName(r.read_i32()?),
            4 => MessageParam::SkillName {
                skill_id: r.read_i32()?,
                level: r.read_i32()?,
            },
            6 => MessageParam::Long(r.read_i64()?),
            12 => MessageParam::CreatureName(r.read_string()?),
            other => {
                return Err(ProtocolError::FieldOutOfRange {
                    field: "message_param_type",
                    value: i64::from(other),
                })
            }
        };
        Ok(param)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemMessage {
    pub id: SystemMessageId,
    pub params: Vec<MessageParam>,
}

impl SystemMessage {
    pub fn new(id: SystemMessageId) -> Self {
        Self {
            id,
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: MessageParam) -> Self {
        self.params.push(param);
        self
    }
}

// ── Snapshots ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharSelected {
    pub object_id: ObjectId,
    pub name: String,
    pub class_id: i32,
    pub level: i32,
    pub current_hp: i32,
    pub max_hp: i32,
}

/// Attribute codes carried by [`StatusUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum StatusAttribute {
    Level = 0x01,
    CurrentHp = 0x09,
    MaxHp = 0x0A,
}

impl StatusAttribute {
    fn from_code(code: u32) -> Option<Self> {
        match code {
            0x01 => Some(StatusAttribute::Level),
            0x09 => Some(StatusAttribute::CurrentHp),
            0x0A => Some(StatusAttribute::MaxHp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub object_id: ObjectId,
    pub attributes: Vec<(StatusAttribute, i32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackResult {
    pub attacker_obj_id: ObjectId,
    pub target_obj_id: ObjectId,
    pub damage: i32,
    pub critical: bool,
    pub miss: bool,
}

impl AttackResult {
    pub const FLAG_MISS: u8 = 0x01;
    pub const FLAG_CRITICAL: u8 = 0x20;

    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.miss {
            flags |= Self::FLAG_MISS;
        }
        if self.critical {
            flags |= Self::FLAG_CRITICAL;
        }
        flags
    }
}

/// Cast animation broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicSkillCast {
    pub caster_obj_id: ObjectId,
    pub target_obj_id: ObjectId,
    pub skill_id: i32,
    pub skill_level: i32,
    pub hit_time_ms: i32,
    pub reuse_delay_ms: i32,
}

/// Current and post-removal value of one base stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatPreview {
    pub current: i32,
    pub after_removal: i32,
}

/// Order of [`HennaRemovalPreview::stats`] on the wire.
pub const PREVIEW_STAT_ORDER: [&str; 6] = ["INT", "STR", "CON", "MEN", "DEX", "WIT"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HennaRemovalPreview {
    pub symbol_id: i32,
    pub dye_item_id: i32,
    pub cancel_count: i64,
    pub cancel_fee: i64,
    /// `true` when the player can afford the removal fee.
    pub can_remove: bool,
    pub adena: i64,
    /// In [`PREVIEW_STAT_ORDER`].
    pub stats: [StatPreview; 6],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariationTargetAccepted {
    pub item_obj_id: ObjectId,
    pub item_id: i32,
}

/// How a member relates to a matching room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum RoomMemberType {
    Leader = 0,
    Member = 1,
    Waiting = 2,
}

impl RoomMemberType {
    fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(RoomMemberType::Leader),
            1 => Some(RoomMemberType::Member),
            2 => Some(RoomMemberType::Waiting),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMemberSnapshot {
    pub object_id: ObjectId,
    pub name: String,
    pub level: i32,
    pub class_id: i32,
    pub location_id: i32,
    pub member_type: RoomMemberType,
}

/// Full member list of a matching room, as seen by one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMemberList {
    /// The recipient's own relation to the room.
    pub viewer_type: RoomMemberType,
    pub members: Vec<RoomMemberSnapshot>,
}

// ── ServerPacket ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerPacket {
    CharSelected(CharSelected),
    StatusUpdate(StatusUpdate),
    ActionFailed,
    AttackResult(AttackResult),
    MagicSkillUse(MagicSkillCast),
    SystemMessage(SystemMessage),
    LeaveWorld,
    HennaItemRemoveInfo(HennaRemovalPreview),
    ExPutItemResultForVariationMake(VariationTargetAccepted),
    ExMpccRoomMember(RoomMemberList),
}

impl ServerPacket {
    pub fn id(&self) -> ServerPacketId {
        match self {
            ServerPacket::CharSelected(_) => ServerPacketId::CharSelected,
            ServerPacket::StatusUpdate(_) => ServerPacketId::StatusUpdate,
            ServerPacket::ActionFailed => ServerPacketId::ActionFailed,
            ServerPacket::AttackResult(_) => ServerPacketId::AttackResult,
            ServerPacket::MagicSkillUse(_) => ServerPacketId::MagicSkillUse,
            ServerPacket::SystemMessage(_) => ServerPacketId::SystemMessage,
            ServerPacket::LeaveWorld => ServerPacketId::LeaveWorld,
            ServerPacket::HennaItemRemoveInfo(_) => ServerPacketId::HennaItemRemoveInfo,
            ServerPacket::ExPutItemResultForVariationMake(_) => {
                ServerPacketId::ExPutItemResultForVariationMake
            }
            ServerPacket::ExMpccRoomMember(_) => ServerPacketId::ExMpccRoomMember,
        }
    }

    pub fn system_message(id: SystemMessageId) -> Self {
        ServerPacket::SystemMessage(SystemMessage::new(id))
    }

    /// Writes the payload (without wire id).
    pub fn encode_payload(&self, w: &mut PacketWriter) {
        match self {
            ServerPacket::CharSelected(p) => {
                w.write_string(&p.name)
                    .write_i32(p.object_id)
                    .write_i32(p.class_id)
                    .write_i32(p.level)
                    .write_i32(p.current_hp)
                    .write_i32(p.max_hp);
            }
            ServerPacket::StatusUpdate(p) => {
                w.write_i32(p.object_id).write_i32(p.attributes.len() as i32);
                for (attr, value) in &p.attributes {
                    w.write_u32(*attr as u32).write_i32(*value);
                }
            }
            ServerPacket::ActionFailed | ServerPacket::LeaveWorld => {}
            ServerPacket::AttackResult(p) => {
                w.write_i32(p.attacker_obj_id)
                    .write_i32(p.target_obj_id)
                    .write_i32(p.damage)
                    .write_u8(p.flags());
            }
            ServerPacket::MagicSkillUse(p) => {
                w.write_i32(p.caster_obj_id)
                    .write_i32(p.target_obj_id)
                    .write_i32(p.skill_id)
                    .write_i32(p.skill_level)
                    .write_i32(p.hit_time_ms)
                    .write_i32(p.reuse_delay_ms);
            }
            ServerPacket::SystemMessage(p) => {
                w.write_i32(p.id.code()).write_i32(p.params.len() as i32);
                for param in &p.params {
                    param.encode(w);
                }
            }
            ServerPacket::HennaItemRemoveInfo(p) => {
                w.write_i32(p.symbol_id)
                    .write_i32(p.dye_item_id)
                    .write_i64(p.cancel_count)
                    .write_i64(p.cancel_fee)
                    .write_i32(i32::from(p.can_remove))
                    .write_i64(p.adena);
                for stat in &p.stats {
                    w.write_i32(stat.current).write_i32(stat.after_removal);
                }
            }
            ServerPacket::ExPutItemResultForVariationMake(p) => {
                w.write_i32(p.item_obj_id).write_i32(p.item_id).write_i32(1);
            }
            ServerPacket::ExMpccRoomMember(p) => {
                w.write_i32(p.viewer_type as i32)
                    .write_i32(p.members.len() as i32);
                for m in &p.members {
                    w.write_i32(m.object_id)
                        .write_string(&m.name)
                        .write_i32(m.level)
                        .write_i32(m.class_id)
                        .write_i32(m.location_id)
                        .write_i32(m.member_type as i32);
                }
            }
        }
    }

    /// Reads a payload written by [`encode_payload`](Self::encode_payload).
    ///
    /// The server never calls this; it exists for test clients and tooling
    /// that need to inspect what was sent.
    pub fn decode(id: ServerPacketId, r: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        let packet = match id {
            ServerPacketId::CharSelected => ServerPacket::CharSelected(CharSelected {
                name: r.read_string()?,
                object_id: r.read_i32()?,
                class_id: r.read_i32()?,
                level: r.read_i32()?,
                current_hp: r.read_i32()?,
                max_hp: r.read_i32()?,
            }),
            ServerPacketId::StatusUpdate => {
                let object_id = r.read_i32()?;
                let count = read_count(r, "status_attribute_count")?;
                let mut attributes = Vec::with_capacity(count.min(16));
                for _ in 0..count {
                    let code = r.read_u32()?;
                    let attr = StatusAttribute::from_code(code).ok_or(ProtocolError::FieldOutOfRange {
                        field: "status_attribute",
                        value: i64::from(code),
                    })?;
                    attributes.push((attr, r.read_i32()?));
                }
                ServerPacket::StatusUpdate(StatusUpdate { object_id, attributes })
            }
            ServerPacketId::ActionFailed => ServerPacket::ActionFailed,
            ServerPacketId::LeaveWorld => ServerPacket::LeaveWorld,
            ServerPacketId::AttackResult => {
                let attacker_obj_id = r.read_i32()?;
                let target_obj_id = r.read_i32()?;
                let damage = r.read_i32()?;
                let flags = r.read_u8()?;
                ServerPacket::AttackResult(AttackResult {
                    attacker_obj_id,
                    target_obj_id,
                    damage,
                    critical: flags & AttackResult::FLAG_CRITICAL != 0,
                    miss: flags & AttackResult::FLAG_MISS != 0,
                })
            }
            ServerPacketId::MagicSkillUse => ServerPacket::MagicSkillUse(MagicSkillCast {
                caster_obj_id: r.read_i32()?,
                target_obj_id: r.read_i32()?,
                skill_id: r.read_i32()?,
                skill_level: r.read_i32()?,
                hit_time_ms: r.read_i32()?,
                reuse_delay_ms: r.read_i32()?,
            }),
            ServerPacketId::SystemMessage => {
                let code = r.read_i32()?;
                let id = SystemMessageId::from_code(code).ok_or(ProtocolError::FieldOutOfRange {
                    field: "system_message_id",
                    value: i64::from(code),
                })?;
                let count = read_count(r, "message_param_count")?;
                let mut params = Vec::with_capacity(count.min(8));
                for _ in 0..count {
                    params.push(MessageParam::decode(r)?);
                }
                ServerPacket::SystemMessage(SystemMessage { id, params })
            }
            ServerPacketId::HennaItemRemoveInfo => {
                let symbol_id = r.read_i32()?;
                let dye_item_id = r.read_i32()?;
                let cancel_count = r.read_i64()?;
                let cancel_fee = r.read_i64()?;
                let can_remove = r.read_i32()? != 0;
                let adena = r.read_i64()?;
                let mut stats = [StatPreview::default(); 6];
                for stat in &mut stats {
                    stat.current = r.read_i32()?;
                    stat.after_removal = r.read_i32()?;
                }
                ServerPacket::HennaItemRemoveInfo(HennaRemovalPreview {
                    symbol_id,
                    dye_item_id,
                    cancel_count,
                    cancel_fee,
                    can_remove,
                    adena,
                    stats,
                })
            }
            ServerPacketId::ExPutItemResultForVariationMake => {
                let item_obj_id = r.read_i32()?;
                let item_id = r.read_i32()?;
                r.read_i32()?;
                ServerPacket::ExPutItemResultForVariationMake(VariationTargetAccepted {
                    item_obj_id,
                    item_id,
                })
            }
            ServerPacketId::ExMpccRoomMember => {
                let viewer_type = read_member_type(r)?;
                let count = read_count(r, "room_member_count")?;
                let mut members = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    members.push(RoomMemberSnapshot {
                        object_id: r.read_i32()?,
                        name: r.read_string()?,
                        level: r.read_i32()?,
                        class_id: r.read_i32()?,
                        location_id: r.read_i32()?,
                        member_type: read_member_type(r)?,
                    });
                }
                ServerPacket::ExMpccRoomMember(RoomMemberList { viewer_type, members })
            }
        };
        Ok(packet)
    }
}

fn read_count(r: &mut PacketReader<'_>, field: &'static str) -> Result<usize, ProtocolError> {
    let count = r.read_i32()?;
    usize::try_from(count).map_err(|_| ProtocolError::FieldOutOfRange {
        field,
        value: i64::from(count),
    })
}

fn read_member_type(r: &mut PacketReader<'_>) -> Result<RoomMemberType, ProtocolError> {
    let code = r.read_i32()?;
    RoomMemberType::from_code(code).ok_or(ProtocolError::FieldOutOfRange {
        field: "room_member_type",
        value: i64::from(code),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(packet: &ServerPacket) -> Vec<u8> {
        let mut w = PacketWriter::new();
        packet.encode_payload(&mut w);
        w.into_bytes()
    }

    #[test]
    fn test_room_member_layout() {
        // Arrange
        let packet = ServerPacket::ExMpccRoomMember(RoomMemberList {
            viewer_type: RoomMemberType::Member,
            members: vec![RoomMemberSnapshot {
                object_id: 7,
                name: "Ab".into(),
                level: 85,
                class_id: 140,
                location_id: 3,
                member_type: RoomMemberType::Leader,
            }],
        });

        // Act
        let bytes = encode(&packet);

        // Assert
        let expected: Vec<u8> = [
            &1i32.to_le_bytes()[..],   // viewer type
            &1i32.to_le_bytes()[..],   // member count
            &7i32.to_le_bytes()[..],   // object id
            &[2u8, 0, b'A', 0, b'b', 0][..], // counted name
            &85i32.to_le_bytes()[..],
            &140i32.to_le_bytes()[..],
            &3i32.to_le_bytes()[..],
            &0i32.to_le_bytes()[..],   // leader
        ]
        .concat();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_system_message_with_params_decodes_back() {
        let packet = ServerPacket::SystemMessage(
            SystemMessage::new(SystemMessageId::C1InflictedS3DamageOnC2)
                .with_param(MessageParam::CreatureName("Hero".into()))
                .with_param(MessageParam::CreatureName("Orc".into()))
                .with_param(MessageParam::Number(512)),
        );
        let bytes = encode(&packet);
        let decoded = ServerPacket::decode(packet.id(), &mut PacketReader::new(&bytes));
        assert_eq!(decoded, Ok(packet));
    }

    #[test]
    fn test_attack_result_flags() {
        let packet = ServerPacket::AttackResult(AttackResult {
            attacker_obj_id: 1,
            target_obj_id: 2,
            damage: 30,
            critical: true,
            miss: false,
        });
        let bytes = encode(&packet);
        assert_eq!(bytes.len(), 13);
        assert_eq!(bytes[12], AttackResult::FLAG_CRITICAL);
    }

    #[test]
    fn test_empty_payload_packets() {
        assert!(encode(&ServerPacket::ActionFailed).is_empty());
        assert!(encode(&ServerPacket::LeaveWorld).is_empty());
    }

    #[test]
    fn test_decode_rejects_negative_member_count() {
        let mut w = PacketWriter::new();
        w.write_i32(0).write_i32(-1);
        let result = ServerPacket::decode(
            ServerPacketId::ExMpccRoomMember,
            &mut PacketReader::new(w.as_slice()),
        );
        assert_eq!(
            result,
            Err(ProtocolError::FieldOutOfRange { field: "room_member_count", value: -1 })
        );
    }
}
