//! Load-only data records shared by the world model, the data store and the
//! TOML configuration.
//!
//! These are plain values: the world copies what it needs out of them when an
//! object is spawned, so nothing here is ever mutated after loading.

use realm_core::{InstanceType, ObjectId};
use serde::{Deserialize, Serialize};

// ── Base stats ────────────────────────────────────────────────────────────────

/// The six base stats a henna can modify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BaseStats {
    #[serde(default)]
    pub int: i32,
    #[serde(default)]
    pub str: i32,
    #[serde(default)]
    pub con: i32,
    #[serde(default)]
    pub men: i32,
    #[serde(default)]
    pub dex: i32,
    #[serde(default)]
    pub wit: i32,
}

impl BaseStats {
    /// Returns the stats in the order the henna preview packet lists them
    /// (INT, STR, CON, MEN, DEX, WIT).
    pub fn in_preview_order(&self) -> [i32; 6] {
        [self.int, self.str, self.con, self.men, self.dex, self.wit]
    }

    /// Component-wise difference `self - other`.
    pub fn minus(&self, other: &BaseStats) -> BaseStats {
        BaseStats {
            int: self.int - other.int,
            str: self.str - other.str,
            con: self.con - other.con,
            men: self.men - other.men,
            dex: self.dex - other.dex,
            wit: self.wit - other.wit,
        }
    }
}

// ── Characters and NPCs ───────────────────────────────────────────────────────

/// A persisted player character, as returned by
/// [`DataStore::load_character`](crate::application::collaborators::DataStore::load_character).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub object_id: ObjectId,
    pub name: String,
    #[serde(default = "default_character_kind")]
    pub kind: InstanceType,
    #[serde(default = "default_level")]
    pub level: i32,
    #[serde(default)]
    pub class_id: i32,
    #[serde(default = "default_max_hp")]
    pub max_hp: i32,
    #[serde(default = "default_p_atk")]
    pub p_atk: i32,
    #[serde(default = "default_p_def")]
    pub p_def: i32,
    /// Critical rate in percent.
    #[serde(default)]
    pub critical_rate: i32,
    /// Upper bound on a single hit taken; `0` means unlimited.
    #[serde(default)]
    pub damage_limit: i32,
    #[serde(default)]
    pub adena: i64,
    #[serde(default)]
    pub location_id: i32,
    /// Symbol ids of the hennas currently drawn.
    #[serde(default)]
    pub hennas: Vec<i32>,
    #[serde(default)]
    pub stats: BaseStats,
}

/// A non-player creature placed in the world at boot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcSpawn {
    /// Fixed id; a runtime id is allocated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<ObjectId>,
    pub name: String,
    pub kind: InstanceType,
    #[serde(default = "default_level")]
    pub level: i32,
    #[serde(default = "default_max_hp")]
    pub max_hp: i32,
    #[serde(default = "default_p_atk")]
    pub p_atk: i32,
    #[serde(default = "default_p_def")]
    pub p_def: i32,
    #[serde(default)]
    pub critical_rate: i32,
    #[serde(default)]
    pub damage_limit: i32,
}

// ── Items ─────────────────────────────────────────────────────────────────────

/// Broad item category; only equipment can be refined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Weapon,
    Armor,
    Accessory,
    Etc,
}

impl ItemKind {
    pub fn is_refinable(self) -> bool {
        !matches!(self, ItemKind::Etc)
    }
}

/// One item instance in someone's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub object_id: ObjectId,
    /// Template id shared by every instance of the same item.
    pub item_id: i32,
    pub owner_id: ObjectId,
    pub kind: ItemKind,
    #[serde(default)]
    pub augmented: bool,
}

// ── Templates ─────────────────────────────────────────────────────────────────

/// A henna (dye symbol) template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HennaTemplate {
    pub symbol_id: i32,
    pub dye_item_id: i32,
    #[serde(default)]
    pub cancel_count: i64,
    #[serde(default)]
    pub cancel_fee: i64,
    /// Stat bonuses granted while the henna is drawn.
    #[serde(default)]
    pub bonus: BaseStats,
}

/// A fatal-blow skill template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillTemplate {
    pub skill_id: i32,
    #[serde(default = "default_level")]
    pub level: i32,
    pub power: f64,
    /// Land chance in percent.
    #[serde(default = "default_chance")]
    pub chance: f64,
    /// Critical chance in percent.
    #[serde(default)]
    pub critical_chance: f64,
    #[serde(default)]
    pub over_hit: bool,
    #[serde(default)]
    pub hit_time_ms: i32,
    #[serde(default)]
    pub reuse_delay_ms: i32,
}

/// A matching room that exists from boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub room_id: i32,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_character_kind() -> InstanceType {
    InstanceType::Player
}
fn default_level() -> i32 {
    1
}
fn default_max_hp() -> i32 {
    100
}
fn default_p_atk() -> i32 {
    10
}
fn default_p_def() -> i32 {
    10
}
fn default_chance() -> f64 {
    100.0
}
