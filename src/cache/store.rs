//! Cache store holding every write-back family.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use dashmap::mapref::one::RefMut;
use mongodb::bson::{Bson, Document, doc};
use parking_lot::RwLock;
use tracing::info;

use super::Family;
use crate::database::models::{GuildConfig, LevelingEntry, LevelingKey, PrefixEntry, UserProfile};
use crate::database::{Collection, DocumentStore, GuildId, RecordDefaults, UserId};
use crate::error::Result;

/// Flush bookkeeping of one family.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushStatus {
    pub collection: Collection,
    pub entries: usize,
    pub last_flush: Option<DateTime<Utc>>,
}

/// Owned in-memory state of the cache core.
///
/// Constructed empty, populated once by the cold-start loader and mutated
/// in place afterwards. Mutations made through the returned guards are
/// picked up by the next flush of that family without any explicit save.
#[derive(Debug)]
pub struct CacheStore {
    guild_configs: Arc<Family<GuildConfig>>,
    user_profiles: Arc<Family<UserProfile>>,
    prefixes: Arc<Family<PrefixEntry>>,
    leveling: Arc<Family<LevelingEntry>>,
    blacklist: DashSet<UserId>,
    /// Pending reminders as stored. Their shape belongs to the reminder feature.
    reminders: RwLock<Vec<Document>>,
    defaults: Arc<RecordDefaults>,
}

impl CacheStore {
    pub fn new(defaults: RecordDefaults) -> Self {
        let defaults = Arc::new(defaults);
        Self {
            guild_configs: Arc::new(Family::new(Arc::clone(&defaults))),
            user_profiles: Arc::new(Family::new(Arc::clone(&defaults))),
            prefixes: Arc::new(Family::new(Arc::clone(&defaults))),
            leveling: Arc::new(Family::new(Arc::clone(&defaults))),
            blacklist: DashSet::new(),
            reminders: RwLock::new(Vec::new()),
            defaults,
        }
    }

    pub fn defaults(&self) -> &RecordDefaults {
        &self.defaults
    }

    pub fn guild_configs(&self) -> &Arc<Family<GuildConfig>> {
        &self.guild_configs
    }

    pub fn user_profiles(&self) -> &Arc<Family<UserProfile>> {
        &self.user_profiles
    }

    pub fn prefixes(&self) -> &Arc<Family<PrefixEntry>> {
        &self.prefixes
    }

    pub fn leveling(&self) -> &Arc<Family<LevelingEntry>> {
        &self.leveling
    }

    pub fn get_or_default_guild_config(&self, guild_id: GuildId) -> RefMut<'_, GuildId, GuildConfig> {
        self.guild_configs.get_or_default(guild_id)
    }

    pub fn get_or_default_user_profile(&self, user_id: UserId) -> RefMut<'_, UserId, UserProfile> {
        self.user_profiles.get_or_default(user_id)
    }

    pub fn get_or_default_leveling(
        &self,
        user_id: UserId,
        guild_id: GuildId,
    ) -> RefMut<'_, LevelingKey, LevelingEntry> {
        self.leveling.get_or_default(LevelingKey::new(user_id, guild_id))
    }

    /// Top `limit` members of a guild by experience, highest first.
    pub fn leaderboard(&self, guild_id: GuildId, limit: usize) -> Vec<LevelingEntry> {
        let mut entries = self.leveling.collect_where(|entry| entry.guild_id == guild_id);
        entries.sort_by(|a, b| b.xp.cmp(&a.xp).then(a.user_id.cmp(&b.user_id)));
        entries.truncate(limit);
        entries
    }

    pub fn is_blacklisted(&self, user_id: UserId) -> bool {
        self.blacklist.contains(&user_id)
    }

    /// Replace the blacklist with freshly loaded ids.
    pub fn replace_blacklist(&self, user_ids: impl IntoIterator<Item = UserId>) {
        self.blacklist.clear();
        for user_id in user_ids {
            self.blacklist.insert(user_id);
        }
    }

    pub fn blacklist_len(&self) -> usize {
        self.blacklist.len()
    }

    /// Ban a user from the bot. Written through to the store before the
    /// cache changes.
    pub async fn blacklist_user(&self, store: &dyn DocumentStore, user_id: UserId) -> Result<()> {
        store
            .update_one(
                Collection::Blacklisted,
                doc! { "_id": user_id },
                doc! { "blacklisted_at": Utc::now().timestamp() },
            )
            .await?;

        self.blacklist.insert(user_id);
        info!("Blacklisted user {}", user_id);
        Ok(())
    }

    /// Lift a ban. Returns whether the user was blacklisted.
    pub async fn unblacklist_user(&self, store: &dyn DocumentStore, user_id: UserId) -> Result<bool> {
        store
            .delete_one(Collection::Blacklisted, doc! { "_id": user_id })
            .await?;

        let removed = self.blacklist.remove(&user_id).is_some();
        if removed {
            info!("Removed user {} from blacklist", user_id);
        }
        Ok(removed)
    }

    /// Copy of every cached reminder.
    pub fn reminders(&self) -> Vec<Document> {
        self.reminders.read().clone()
    }

    pub fn reminder_count(&self) -> usize {
        self.reminders.read().len()
    }

    /// Replace the reminders with freshly loaded documents.
    pub fn replace_reminders(&self, reminders: Vec<Document>) {
        *self.reminders.write() = reminders;
    }

    /// Store a new reminder, then cache it.
    pub async fn add_reminder(&self, store: &dyn DocumentStore, reminder: Document) -> Result<()> {
        store.insert_one(Collection::Reminders, reminder.clone()).await?;
        self.reminders.write().push(reminder);
        Ok(())
    }

    /// Delete the reminder with the given `_id` from the store and the cache.
    /// Returns whether it was cached.
    pub async fn remove_reminder(&self, store: &dyn DocumentStore, id: Bson) -> Result<bool> {
        store
            .delete_one(Collection::Reminders, doc! { "_id": id.clone() })
            .await?;

        let mut reminders = self.reminders.write();
        let before = reminders.len();
        reminders.retain(|r| r.get("_id") != Some(&id));
        Ok(reminders.len() < before)
    }

    /// Size and last flush time of every write-back family.
    pub fn flush_status(&self) -> Vec<FlushStatus> {
        vec![
            status(&self.guild_configs),
            status(&self.prefixes),
            status(&self.leveling),
            status(&self.user_profiles),
        ]
    }
}

fn status<R: crate::database::Record>(family: &Family<R>) -> FlushStatus {
    FlushStatus {
        collection: family.collection(),
        entries: family.len(),
        last_flush: family.last_flush(),
    }
}
