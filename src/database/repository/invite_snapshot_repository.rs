//! Invite baseline snapshots.
//!
//! Stores the last observed use count of every invite code in a guild so
//! the join handler can tell which invite was used. Deciding which code
//! changed is left to the caller.

use std::collections::BTreeMap;
use std::sync::Arc;

use mongodb::bson::{self, doc};
use tracing::debug;

use crate::database::models::InviteSnapshot;
use crate::database::{Collection, DocumentStore, GuildId};
use crate::error::Result;

/// Invite code -> uses.
pub type InviteUses = BTreeMap<String, i64>;

/// Repository for per-guild invite baselines.
pub struct InviteSnapshotRepository {
    store: Arc<dyn DocumentStore>,
}

impl InviteSnapshotRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// The stored baseline to diff `current` against.
    ///
    /// Returns `None` when the guild had no baseline; `current` is then
    /// stored as the first one and there is nothing to compare.
    pub async fn diff_invite_uses(&self, guild_id: GuildId, current: &InviteUses) -> Result<Option<InviteUses>> {
        let raw = self
            .store
            .find_one(Collection::InviteBaselines, doc! { "_id": guild_id })
            .await?;

        match raw {
            Some(raw) => {
                let snapshot: InviteSnapshot = bson::from_document(raw)?;
                Ok(Some(snapshot.invites))
            }
            None => {
                let snapshot = InviteSnapshot {
                    guild_id,
                    invites: current.clone(),
                };
                self.store
                    .insert_one(Collection::InviteBaselines, bson::to_document(&snapshot)?)
                    .await?;
                debug!("Created invite baseline for guild {}", guild_id);
                Ok(None)
            }
        }
    }

    /// Replace the guild's baseline with `current`.
    pub async fn refresh_invite_snapshot(&self, guild_id: GuildId, current: &InviteUses) -> Result<()> {
        self.store
            .update_one(
                Collection::InviteBaselines,
                doc! { "_id": guild_id },
                doc! { "invites": bson::to_bson(current)? },
            )
            .await?;
        debug!("Refreshed invite baseline for guild {}", guild_id);
        Ok(())
    }
}
