//! Per-guild command prefix model.

use mongodb::bson::{Bson, Document, doc};
use serde::{Deserialize, Serialize};

use crate::database::record::{GuildId, Record, RecordDefaults, int_field};
use crate::database::store::Collection;
use crate::error::Result;

/// Ordered command prefixes of one guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixEntry {
    #[serde(rename = "_id")]
    pub guild_id: GuildId,

    /// Stored order is the match order.
    pub prefix: Vec<String>,
}

impl Record for PrefixEntry {
    type Key = GuildId;

    const COLLECTION: Collection = Collection::Prefixes;

    fn key(&self) -> GuildId {
        self.guild_id
    }

    fn key_of(doc: &Document) -> Result<GuildId> {
        int_field(doc, Self::COLLECTION, "_id")
    }

    fn filter(key: &GuildId) -> Document {
        doc! { "_id": *key }
    }

    fn with_defaults(key: &GuildId, defaults: &RecordDefaults) -> Self {
        Self {
            guild_id: *key,
            prefix: vec![defaults.prefix.clone()],
        }
    }

    /// Older documents store a single prefix string.
    fn repair(doc: &mut Document) -> bool {
        let Some(Bson::String(single)) = doc.get("prefix") else {
            return false;
        };
        let list = Bson::Array(vec![Bson::String(single.clone())]);
        doc.insert("prefix", list);
        true
    }
}
