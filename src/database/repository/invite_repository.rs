//! Invite ledger repository.
//!
//! Invite counts and inviter attribution per user. Writes are rare and must
//! survive a crash, so every change goes straight to the store; a Moka cache
//! in front only serves reads and is updated after a write succeeds.

use std::sync::Arc;

use mongodb::bson::{self, Document, doc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::{CacheConfig, TypedCache};
use crate::database::models::{InviteCounts, InviteKind, InviteRecord, merge_inviter};
use crate::database::{Collection, DocumentStore, GuildId, UserId};
use crate::error::{CacheError, Result};

/// Repository for per-user invite records.
pub struct InviteRepository {
    store: Arc<dyn DocumentStore>,
    cache: TypedCache<UserId, InviteRecord>,
    /// Serializes read-modify-write cycles so two updates cannot interleave.
    write_lock: Mutex<()>,
}

impl InviteRepository {
    pub fn new(store: Arc<dyn DocumentStore>, config: CacheConfig) -> Self {
        Self {
            store,
            cache: TypedCache::new("invites", config),
            write_lock: Mutex::new(()),
        }
    }

    /// Get a user's invite record, returning None if never written.
    pub async fn get(&self, user_id: UserId) -> Result<Option<InviteRecord>> {
        if let Some(record) = self.cache.get(&user_id) {
            return Ok(Some(record));
        }

        let raw = self
            .store
            .find_one(Collection::Invites, InviteRecord::filter(user_id))
            .await?;
        let record = raw.map(bson::from_document::<InviteRecord>).transpose()?;

        if let Some(r) = &record {
            self.cache.insert(user_id, r.clone());
        }

        Ok(record)
    }

    /// Set one kind of invite count of `user_id` in `guild_id`.
    ///
    /// Other kinds and other guilds are left untouched. A user without a
    /// record gets one with the other kinds at zero.
    ///
    /// # Errors
    /// `InvariantViolation` for a negative amount, or one that would push the
    /// guild's total past `i64::MAX`, with nothing written.
    pub async fn record_invite_count(
        &self,
        user_id: UserId,
        guild_id: GuildId,
        kind: InviteKind,
        amount: i64,
    ) -> Result<()> {
        if amount < 0 {
            return Err(CacheError::InvariantViolation(format!(
                "{} invite count for user {} cannot be negative ({})",
                kind.as_str(),
                user_id,
                amount
            )));
        }

        let _guard = self.write_lock.lock().await;

        match self.get(user_id).await? {
            None => {
                let mut record = InviteRecord::new(user_id);
                record
                    .guilds
                    .insert(guild_id.to_string(), InviteCounts::first(kind, amount));

                self.write(user_id, self.store.insert_one(Collection::Invites, bson::to_document(&record)?))
                    .await?;
                self.cache.insert(user_id, record);
            }
            Some(mut record) => {
                let counts = record.guilds.entry(guild_id.to_string()).or_default();
                counts.set(kind, amount);
                if counts.total().is_none() {
                    return Err(overflow(user_id, guild_id));
                }

                let set = doc! { "guilds": bson::to_bson(&record.guilds)? };
                self.write(user_id, self.update(user_id, set)).await?;
                self.cache.insert(user_id, record);
            }
        }

        debug!(
            "Set {} invites of user {} in guild {} to {}",
            kind.as_str(),
            user_id,
            guild_id,
            amount
        );
        Ok(())
    }

    /// One invite count, zero if never recorded.
    pub async fn invite_count(&self, user_id: UserId, guild_id: GuildId, kind: InviteKind) -> Result<i64> {
        Ok(self.counts(user_id, guild_id).await?.get(kind))
    }

    /// `[real, fake, left]`, zeros if never recorded.
    pub async fn invite_counts(&self, user_id: UserId, guild_id: GuildId) -> Result<[i64; 3]> {
        Ok(self.counts(user_id, guild_id).await?.all())
    }

    /// Sum of real, fake and left invites.
    ///
    /// # Errors
    /// `InvariantViolation` if stored counts add up past `i64::MAX`.
    pub async fn invite_total(&self, user_id: UserId, guild_id: GuildId) -> Result<i64> {
        self.counts(user_id, guild_id)
            .await?
            .total()
            .ok_or_else(|| overflow(user_id, guild_id))
    }

    /// Record who invited `user_id` into `guild_id`, replacing any earlier
    /// inviter for that guild.
    pub async fn record_inviter(&self, user_id: UserId, inviter_id: UserId, guild_id: GuildId) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        match self.get(user_id).await? {
            None => {
                let mut record = InviteRecord::new(user_id);
                record.inviters = Some(merge_inviter(None, guild_id, inviter_id));

                self.write(user_id, self.store.insert_one(Collection::Invites, bson::to_document(&record)?))
                    .await?;
                self.cache.insert(user_id, record);
            }
            Some(mut record) => {
                let merged = merge_inviter(record.inviters.take(), guild_id, inviter_id);
                let set = doc! { "inviters": bson::to_bson(&merged)? };
                record.inviters = Some(merged);

                self.write(user_id, self.update(user_id, set)).await?;
                self.cache.insert(user_id, record);
            }
        }

        debug!("User {} was invited to guild {} by {}", user_id, guild_id, inviter_id);
        Ok(())
    }

    /// Who invited `user_id` into `guild_id`. `None` means unknown.
    pub async fn inviter(&self, user_id: UserId, guild_id: GuildId) -> Result<Option<UserId>> {
        Ok(self
            .get(user_id)
            .await?
            .and_then(|record| record.inviter(guild_id)))
    }

    async fn counts(&self, user_id: UserId, guild_id: GuildId) -> Result<InviteCounts> {
        Ok(self
            .get(user_id)
            .await?
            .map(|record| record.counts(guild_id))
            .unwrap_or_default())
    }

    async fn update(&self, user_id: UserId, set: Document) -> Result<()> {
        self.store
            .update_one(Collection::Invites, InviteRecord::filter(user_id), set)
            .await
    }

    /// Await a store write. On failure the cached copy is dropped, since a
    /// timed-out write may still have reached the server.
    async fn write(&self, user_id: UserId, op: impl Future<Output = Result<()>>) -> Result<()> {
        if let Err(e) = op.await {
            warn!("Invite write for user {} failed: {}", user_id, e);
            self.cache.invalidate(&user_id);
            return Err(e);
        }
        Ok(())
    }
}

fn overflow(user_id: UserId, guild_id: GuildId) -> CacheError {
    CacheError::InvariantViolation(format!(
        "invite total for user {user_id} in guild {guild_id} would overflow"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    fn repo() -> (Arc<MemoryStore>, InviteRepository) {
        let store = Arc::new(MemoryStore::new());
        let repo = InviteRepository::new(store.clone(), CacheConfig::default());
        (store, repo)
    }

    #[tokio::test]
    async fn test_first_record_zeroes_other_kinds() {
        let (store, repo) = repo();
        repo.record_invite_count(1, 100, InviteKind::Real, 3).await.unwrap();

        assert_eq!(repo.invite_counts(1, 100).await.unwrap(), [3, 0, 0]);
        let docs = store.documents(Collection::Invites);
        assert_eq!(docs.len(), 1);
        assert_eq!(
            docs[0].get_document("guilds").unwrap().get_document("100").unwrap(),
            &doc! { "real": 3_i64, "fake": 0_i64, "left": 0_i64 }
        );
    }

    #[tokio::test]
    async fn test_update_touches_only_given_kind_and_guild() {
        let (store, repo) = repo();
        store.seed(
            Collection::Invites,
            [doc! { "_id": 1_i64, "guilds": { "100": { "real": 2_i64 } } }],
        );

        repo.record_invite_count(1, 100, InviteKind::Fake, 5).await.unwrap();
        repo.record_invite_count(1, 200, InviteKind::Left, 1).await.unwrap();

        let guilds = store.documents(Collection::Invites)[0]
            .get_document("guilds")
            .unwrap()
            .clone();
        assert_eq!(guilds.get_document("100").unwrap(), &doc! { "real": 2_i64, "fake": 5_i64 });
        assert_eq!(guilds.get_document("200").unwrap(), &doc! { "left": 1_i64 });

        assert_eq!(repo.invite_counts(1, 100).await.unwrap(), [2, 5, 0]);
        assert_eq!(repo.invite_total(1, 100).await.unwrap(), 7);
        assert_eq!(repo.invite_count(1, 200, InviteKind::Left).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_total_is_sum_of_all() {
        let (_, repo) = repo();
        let writes = [
            (InviteKind::Real, 4),
            (InviteKind::Left, 2),
            (InviteKind::Real, 1),
            (InviteKind::Fake, 7),
        ];

        for (kind, amount) in writes {
            repo.record_invite_count(9, 1, kind, amount).await.unwrap();
            let all = repo.invite_counts(9, 1).await.unwrap();
            assert!(all.iter().all(|n| *n >= 0));
            assert_eq!(repo.invite_total(9, 1).await.unwrap(), all.iter().sum::<i64>());
        }

        assert_eq!(repo.invite_counts(9, 1).await.unwrap(), [1, 7, 2]);
    }

    #[tokio::test]
    async fn test_negative_amount_rejected() {
        let (store, repo) = repo();
        repo.record_invite_count(1, 100, InviteKind::Real, 2).await.unwrap();

        let err = repo
            .record_invite_count(1, 100, InviteKind::Real, -1)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::InvariantViolation(_)));
        assert_eq!(repo.invite_count(1, 100, InviteKind::Real).await.unwrap(), 2);
        assert_eq!(store.documents(Collection::Invites).len(), 1);
    }

    #[tokio::test]
    async fn test_total_overflow_rejected() {
        let (store, repo) = repo();
        repo.record_invite_count(1, 1, InviteKind::Real, i64::MAX).await.unwrap();

        let err = repo.record_invite_count(1, 1, InviteKind::Fake, 1).await.unwrap_err();
        assert!(matches!(err, CacheError::InvariantViolation(_)));
        assert_eq!(repo.invite_counts(1, 1).await.unwrap(), [i64::MAX, 0, 0]);
        assert_eq!(repo.invite_total(1, 1).await.unwrap(), i64::MAX);
        assert_eq!(
            store.documents(Collection::Invites)[0]
                .get_document("guilds")
                .unwrap()
                .get_document("1")
                .unwrap()
                .get_i64("fake")
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_overflowing_stored_total_is_an_error() {
        let (store, repo) = repo();
        store.seed(
            Collection::Invites,
            [doc! { "_id": 1_i64, "guilds": { "1": { "real": i64::MAX, "left": 5_i64 } } }],
        );

        let err = repo.invite_total(1, 1).await.unwrap_err();
        assert!(matches!(err, CacheError::InvariantViolation(_)));
        assert_eq!(repo.invite_counts(1, 1).await.unwrap(), [i64::MAX, 0, 5]);
    }

    #[tokio::test]
    async fn test_unknown_user_reads_zero() {
        let (_, repo) = repo();
        assert_eq!(repo.invite_count(5, 1, InviteKind::Real).await.unwrap(), 0);
        assert_eq!(repo.invite_counts(5, 1).await.unwrap(), [0, 0, 0]);
        assert_eq!(repo.invite_total(5, 1).await.unwrap(), 0);
        assert_eq!(repo.inviter(5, 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_inviter_merge() {
        let (store, repo) = repo();
        repo.record_inviter(1, 10, 100).await.unwrap();
        repo.record_inviter(1, 20, 200).await.unwrap();
        repo.record_inviter(1, 11, 100).await.unwrap();

        assert_eq!(repo.inviter(1, 100).await.unwrap(), Some(11));
        assert_eq!(repo.inviter(1, 200).await.unwrap(), Some(20));
        assert_eq!(repo.inviter(1, 300).await.unwrap(), None);

        let doc = &store.documents(Collection::Invites)[0];
        assert_eq!(
            doc.get_document("inviters").unwrap(),
            &doc! { "100": 11_i64, "200": 20_i64 }
        );
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_unchanged() {
        let (store, repo) = repo();
        repo.record_invite_count(1, 100, InviteKind::Real, 2).await.unwrap();

        store.set_unavailable(true);
        assert!(repo.record_invite_count(1, 100, InviteKind::Real, 8).await.is_err());
        store.set_unavailable(false);

        assert_eq!(repo.invite_count(1, 100, InviteKind::Real).await.unwrap(), 2);
    }
}
