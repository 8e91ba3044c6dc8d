//! Per-user, per-guild leveling progress.

use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};

use crate::database::lenient;
use crate::database::record::{GuildId, Record, RecordDefaults, UserId, int_field};
use crate::database::store::Collection;
use crate::error::Result;

/// Composite identifier of a leveling entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LevelingKey {
    pub user_id: UserId,
    pub guild_id: GuildId,
}

impl LevelingKey {
    pub fn new(user_id: UserId, guild_id: GuildId) -> Self {
        Self { user_id, guild_id }
    }
}

/// Experience and message count of one user in one guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelingEntry {
    /// MongoDB document ID
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub oid: Option<ObjectId>,

    #[serde(rename = "id")]
    pub user_id: UserId,
    pub guild_id: GuildId,

    #[serde(deserialize_with = "lenient::int")]
    pub xp: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub messages: i64,
}

impl Record for LevelingEntry {
    type Key = LevelingKey;

    const COLLECTION: Collection = Collection::Leveling;

    fn key(&self) -> LevelingKey {
        LevelingKey::new(self.user_id, self.guild_id)
    }

    fn key_of(doc: &Document) -> Result<LevelingKey> {
        Ok(LevelingKey::new(
            int_field(doc, Self::COLLECTION, "id")?,
            int_field(doc, Self::COLLECTION, "guild_id")?,
        ))
    }

    fn filter(key: &LevelingKey) -> Document {
        doc! { "id": key.user_id, "guild_id": key.guild_id }
    }

    fn with_defaults(key: &LevelingKey, _defaults: &RecordDefaults) -> Self {
        Self {
            oid: None,
            user_id: key.user_id,
            guild_id: key.guild_id,
            xp: 0,
            messages: 0,
        }
    }
}
