//! TOML-based configuration for the game server.
//!
//! One file holds both the server settings and the boot-time data tables:
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 7777
//! log_level = "info"
//!
//! [protocol]
//! max_frame_len = 65535
//! decode_policy = "strict"      # or "drop-frame"
//! max_pending_packets = 1024
//!
//! [execution]
//! lock_timeout_ms = 500
//!
//! [[characters]]
//! object_id = 100001
//! name = "Aria"
//!
//! [[npcs]]
//! name = "Gremlin"
//! kind = "Monster"
//! ```
//!
//! Character and item ids, and any fixed NPC id, must be unique and below
//! `0x1000_0000`; ids from there up are handed out at runtime.
//!
//! Every section and every field may be omitted; missing values fall back to
//! the defaults below, so a server starts with no file at all.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use realm_core::domain::ids::FIRST_RUNTIME_ID;
use realm_core::protocol::codec::{MAX_FRAME_LEN, MIN_FRAME_LEN};
use realm_core::ObjectId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::context::ExecutionSettings;
use crate::application::coordinator::SessionSettings;
use crate::application::inbound::DecodePolicy;
use crate::application::records::{
    CharacterRecord, HennaTemplate, ItemRecord, NpcSpawn, RoomRecord, SkillTemplate,
};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The config parsed but holds an unusable value.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub characters: Vec<CharacterRecord>,
    #[serde(default)]
    pub npcs: Vec<NpcSpawn>,
    #[serde(default)]
    pub items: Vec<ItemRecord>,
    #[serde(default)]
    pub rooms: Vec<RoomRecord>,
    #[serde(default)]
    pub hennas: Vec<HennaTemplate>,
    #[serde(default)]
    pub skills: Vec<SkillTemplate>,
}

/// Listener and logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// IP address to bind the listener to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Wire-level limits and the malformed-payload policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolConfig {
    /// Largest inbound frame accepted, length prefix included.
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
    #[serde(default)]
    pub decode_policy: DecodePolicy,
    /// Outbound queue length at which a client is dropped as a slow consumer.
    #[serde(default = "default_max_pending_packets")]
    pub max_pending_packets: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionConfig {
    /// How long an execute step waits for an actor lock.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    7777
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_frame_len() -> usize {
    MAX_FRAME_LEN
}
fn default_max_pending_packets() -> usize {
    1_024
}
fn default_lock_timeout_ms() -> u64 {
    500
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_frame_len: default_max_frame_len(),
            decode_policy: DecodePolicy::default(),
            max_pending_packets: default_max_pending_packets(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Checks values that parse fine but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&self.protocol.max_frame_len) {
            return Err(ConfigError::Invalid {
                field: "protocol.max_frame_len",
                reason: format!(
                    "{} is outside {MIN_FRAME_LEN}..={MAX_FRAME_LEN}",
                    self.protocol.max_frame_len
                ),
            });
        }
        if self.protocol.max_pending_packets == 0 {
            return Err(ConfigError::Invalid {
                field: "protocol.max_pending_packets",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.execution.lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "execution.lock_timeout_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        self.validate_world_data()
    }

    /// Object ids loaded from the file must sit below [`FIRST_RUNTIME_ID`],
    /// be unique across characters, NPCs and items, and every reference
    /// between records must resolve.
    fn validate_world_data(&self) -> Result<(), ConfigError> {
        let mut taken = HashSet::new();
        let mut claim = |field: &'static str, id: ObjectId| {
            if !(1..FIRST_RUNTIME_ID).contains(&id) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("object id {id} is outside 1..{FIRST_RUNTIME_ID}"),
                });
            }
            if !taken.insert(id) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("object id {id} is used more than once"),
                });
            }
            Ok(())
        };

        for character in &self.characters {
            claim("characters.object_id", character.object_id)?;
        }
        for id in self.npcs.iter().filter_map(|npc| npc.object_id) {
            claim("npcs.object_id", id)?;
        }
        for item in &self.items {
            claim("items.object_id", item.object_id)?;
        }

        if let Some(character) = self.characters.iter().find(|c| !c.kind.is_player()) {
            return Err(ConfigError::Invalid {
                field: "characters.kind",
                reason: format!("{} is a {}, not a player", character.name, character.kind),
            });
        }
        let owners: HashSet<ObjectId> = self.characters.iter().map(|c| c.object_id).collect();
        if let Some(item) = self.items.iter().find(|i| !owners.contains(&i.owner_id)) {
            return Err(ConfigError::Invalid {
                field: "items.owner_id",
                reason: format!(
                    "item {} belongs to {}, which is not a configured character",
                    item.object_id, item.owner_id
                ),
            });
        }
        let mut rooms = HashSet::new();
        if let Some(room) = self.rooms.iter().find(|r| !rooms.insert(r.room_id)) {
            return Err(ConfigError::Invalid {
                field: "rooms.room_id",
                reason: format!("room {} is declared more than once", room.room_id),
            });
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            decode_policy: self.protocol.decode_policy,
            max_pending_packets: self.protocol.max_pending_packets,
            max_frame_len: self.protocol.max_frame_len,
        }
    }

    pub fn execution_settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            lock_timeout: Duration::from_millis(self.execution.lock_timeout_ms),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed, and
/// [`ConfigError::Invalid`] if a value fails [`AppConfig::validate`].
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str::<AppConfig>(&content)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
        Err(e) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    config.validate()?;
    Ok(config)
}

/// Writes `config` to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::records::ItemKind;
    use realm_core::InstanceType;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("realm_test_{}", Uuid::new_v4()))
            .join("realm.toml")
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_app_config_default_values() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.server.port, 7777);
        assert_eq!(cfg.server.bind_address, "0.0.0.0");
        assert_eq!(cfg.server.log_level, "info");
        assert_eq!(cfg.protocol.max_frame_len, 65_535);
        assert_eq!(cfg.protocol.decode_policy, DecodePolicy::Strict);
        assert_eq!(cfg.execution.lock_timeout_ms, 500);
        assert!(cfg.characters.is_empty());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_section_overrides_only_given_fields() {
        // Arrange
        let text = r#"
[protocol]
decode_policy = "drop-frame"
"#;

        // Act
        let cfg: AppConfig = toml::from_str(text).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.protocol.decode_policy, DecodePolicy::DropFrame);
        assert_eq!(cfg.protocol.max_pending_packets, 1_024);
        assert_eq!(cfg.server.port, 7777);
    }

    #[test]
    fn test_data_tables_deserialize() {
        // Arrange
        let text = r#"
[[characters]]
object_id = 100001
name = "Aria"
max_hp = 2400

[[npcs]]
name = "Gremlin"
kind = "Monster"

[[items]]
object_id = 42
item_id = 6579
owner_id = 100001
kind = "weapon"

[[rooms]]
room_id = 1
"#;

        // Act
        let cfg: AppConfig = toml::from_str(text).expect("deserialize tables");

        // Assert
        assert_eq!(cfg.characters[0].max_hp, 2_400);
        assert_eq!(cfg.characters[0].kind, InstanceType::Player);
        assert_eq!(cfg.npcs[0].kind, InstanceType::Monster);
        assert_eq!(cfg.npcs[0].object_id, None);
        assert_eq!(cfg.items[0].kind, ItemKind::Weapon);
        assert_eq!(cfg.rooms[0].room_id, 1);
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        let result: Result<AppConfig, toml::de::Error> = toml::from_str("[[[ not valid toml");
        assert!(result.is_err());
    }

    // ── Validation ────────────────────────────────────────────────────────────

    #[test]
    fn test_validate_rejects_frame_limit_out_of_range() {
        let mut cfg = AppConfig::default();
        cfg.protocol.max_frame_len = 2;

        let result = cfg.validate();

        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "protocol.max_frame_len", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_lock_timeout() {
        let mut cfg = AppConfig::default();
        cfg.execution.lock_timeout_ms = 0;
        assert!(cfg.validate().is_err());
    }

    fn world_config() -> AppConfig {
        toml::from_str(
            r#"
[[characters]]
object_id = 100001
name = "Aria"

[[npcs]]
object_id = 200900
name = "Gremlin"
kind = "Monster"

[[items]]
object_id = 42
item_id = 6579
owner_id = 100001
kind = "weapon"

[[rooms]]
room_id = 1
"#,
        )
        .expect("deserialize world")
    }

    fn rejected_field(cfg: &AppConfig) -> Option<&'static str> {
        match cfg.validate() {
            Err(ConfigError::Invalid { field, .. }) => Some(field),
            _ => None,
        }
    }

    #[test]
    fn test_validate_accepts_consistent_world_data() {
        assert!(world_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_character_id_in_runtime_range() {
        // Arrange
        let mut cfg = world_config();
        cfg.characters[0].object_id = FIRST_RUNTIME_ID + 1;
        cfg.items[0].owner_id = FIRST_RUNTIME_ID + 1;

        // Act / Assert
        assert_eq!(rejected_field(&cfg), Some("characters.object_id"));
    }

    #[test]
    fn test_validate_rejects_item_and_npc_ids_in_runtime_range() {
        let mut cfg = world_config();
        cfg.items[0].object_id = FIRST_RUNTIME_ID;
        assert_eq!(rejected_field(&cfg), Some("items.object_id"));

        let mut cfg = world_config();
        cfg.npcs[0].object_id = Some(FIRST_RUNTIME_ID);
        assert_eq!(rejected_field(&cfg), Some("npcs.object_id"));
    }

    #[test]
    fn test_validate_rejects_non_positive_ids() {
        let mut cfg = world_config();
        cfg.items[0].object_id = 0;
        assert_eq!(rejected_field(&cfg), Some("items.object_id"));
    }

    #[test]
    fn test_validate_rejects_id_shared_by_character_and_npc() {
        // Arrange
        let mut cfg = world_config();
        cfg.npcs[0].object_id = Some(100_001);

        // Act / Assert
        assert_eq!(rejected_field(&cfg), Some("npcs.object_id"));
    }

    #[test]
    fn test_validate_rejects_id_shared_by_item_and_character() {
        let mut cfg = world_config();
        cfg.items[0].object_id = 100_001;
        assert_eq!(rejected_field(&cfg), Some("items.object_id"));
    }

    #[test]
    fn test_validate_rejects_duplicate_character_ids() {
        let mut cfg = world_config();
        let mut twin = cfg.characters[0].clone();
        twin.name = "Bren".to_string();
        cfg.characters.push(twin);
        assert_eq!(rejected_field(&cfg), Some("characters.object_id"));
    }

    #[test]
    fn test_validate_rejects_item_owned_by_unknown_character() {
        let mut cfg = world_config();
        cfg.items[0].owner_id = 100_002;
        assert_eq!(rejected_field(&cfg), Some("items.owner_id"));
    }

    #[test]
    fn test_validate_rejects_item_owned_by_npc() {
        let mut cfg = world_config();
        cfg.items[0].owner_id = 200_900;
        assert_eq!(rejected_field(&cfg), Some("items.owner_id"));
    }

    #[test]
    fn test_validate_rejects_non_player_character_kind() {
        let mut cfg = world_config();
        cfg.characters[0].kind = InstanceType::Monster;
        assert_eq!(rejected_field(&cfg), Some("characters.kind"));
    }

    #[test]
    fn test_validate_rejects_duplicate_room_ids() {
        let mut cfg = world_config();
        cfg.rooms.push(RoomRecord { room_id: 1 });
        assert_eq!(rejected_field(&cfg), Some("rooms.room_id"));
    }

    #[test]
    fn test_settings_are_derived_from_sections() {
        let mut cfg = AppConfig::default();
        cfg.execution.lock_timeout_ms = 250;
        cfg.protocol.max_pending_packets = 8;

        assert_eq!(cfg.execution_settings().lock_timeout, Duration::from_millis(250));
        assert_eq!(cfg.session_settings().max_pending_packets, 8);
    }

    // ── File access ───────────────────────────────────────────────────────────

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/realm.toml");

        let cfg = load_config(&path).expect("missing file is not an error");

        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_and_load_config_via_temp_dir() {
        // Arrange
        let path = temp_path();
        let mut cfg = AppConfig::default();
        cfg.server.port = 17_777;
        cfg.server.log_level = "debug".to_string();
        cfg.rooms.push(RoomRecord { room_id: 4 });

        // Act
        save_config(&path, &cfg).expect("save");
        let loaded = load_config(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_load_config_reports_invalid_values() {
        let path = temp_path();
        let mut cfg = AppConfig::default();
        cfg.protocol.max_pending_packets = 0;
        save_config(&path, &cfg).expect("save");

        let result = load_config(&path);

        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }
}
