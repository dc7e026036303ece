//! In-memory [`DataStore`] backed by the tables of the configuration file.

use std::collections::HashMap;

use async_trait::async_trait;
use realm_core::ObjectId;

use crate::application::collaborators::{DataStore, StoreError};
use crate::application::records::{CharacterRecord, HennaTemplate, SkillTemplate};
use crate::infrastructure::storage::config::AppConfig;

/// Characters and templates indexed by their stable ids.  Later duplicates in
/// the source tables replace earlier ones.
#[derive(Debug, Default)]
pub struct ConfigDataStore {
    characters: HashMap<ObjectId, CharacterRecord>,
    hennas: HashMap<i32, HennaTemplate>,
    skills: HashMap<i32, SkillTemplate>,
}

impl ConfigDataStore {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            characters: config
                .characters
                .iter()
                .map(|c| (c.object_id, c.clone()))
                .collect(),
            hennas: config.hennas.iter().map(|h| (h.symbol_id, h.clone())).collect(),
            skills: config.skills.iter().map(|s| (s.skill_id, s.clone())).collect(),
        }
    }

    pub fn character_count(&self) -> usize {
        self.characters.len()
    }
}

#[async_trait]
impl DataStore for ConfigDataStore {
    async fn load_character(&self, object_id: ObjectId) -> Result<Option<CharacterRecord>, StoreError> {
        Ok(self.characters.get(&object_id).cloned())
    }

    async fn henna(&self, symbol_id: i32) -> Result<Option<HennaTemplate>, StoreError> {
        Ok(self.hennas.get(&symbol_id).cloned())
    }

    async fn skill(&self, skill_id: i32) -> Result<Option<SkillTemplate>, StoreError> {
        Ok(self.skills.get(&skill_id).cloned())
    }
}
