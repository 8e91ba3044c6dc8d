//! Document store contract.
//!
//! Everything the cache core needs from a document database, expressed per
//! named collection. `Database` implements it over MongoDB and `MemoryStore`
//! implements it in memory.

use async_trait::async_trait;
use mongodb::bson::Document;

use crate::error::Result;

/// Collections owned by the bot's database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Prefixes,
    Blacklisted,
    ServerConfig,
    Warnings,
    InviteBaselines,
    Invites,
    Reminders,
    Alarms,
    Leveling,
    UserProfile,
    Starboard,
    Bookmarks,
    SelfRoles,
}

impl Collection {
    /// Name of the collection in the database.
    pub fn name(self) -> &'static str {
        match self {
            Self::Prefixes => "prefixes",
            Self::Blacklisted => "blacklisted",
            Self::ServerConfig => "serverconfig",
            Self::Warnings => "warnings",
            Self::InviteBaselines => "before_invites",
            Self::Invites => "invites",
            Self::Reminders => "reminders",
            Self::Alarms => "alarms",
            Self::Leveling => "leveling",
            Self::UserProfile => "user_profile",
            Self::Starboard => "starboard",
            Self::Bookmarks => "bookmarks",
            Self::SelfRoles => "self_roles",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One insert-or-update: match `filter`, then `$set` every field in `set`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOp {
    pub filter: Document,
    pub set: Document,
}

impl UpsertOp {
    pub fn new(filter: Document, set: Document) -> Self {
        Self { filter, set }
    }
}

/// Async client to a document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document in the collection.
    async fn find_all(&self, collection: Collection) -> Result<Vec<Document>>;

    /// First document matching `filter`.
    async fn find_one(&self, collection: Collection, filter: Document) -> Result<Option<Document>>;

    async fn insert_one(&self, collection: Collection, doc: Document) -> Result<()>;

    /// `$set` the given fields on the document matching `filter`, inserting
    /// it if none matches.
    async fn update_one(&self, collection: Collection, filter: Document, set: Document) -> Result<()>;

    /// Apply many independent upserts in a single call.
    ///
    /// Each operation is atomic on its own; the batch is not a transaction.
    async fn bulk_upsert(&self, collection: Collection, ops: Vec<UpsertOp>) -> Result<()>;

    /// Delete the first document matching `filter`. Returns whether one was removed.
    async fn delete_one(&self, collection: Collection, filter: Document) -> Result<bool>;
}
