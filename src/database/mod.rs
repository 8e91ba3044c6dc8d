//! Database module exports.

mod lenient;
mod memory;
pub mod models;
mod mongo;
mod record;
pub mod repository;
mod store;

pub use memory::MemoryStore;
pub use models::default_automod;
pub use mongo::Database;
pub(crate) use record::int_field;
pub use record::{Ensured, GuildId, Record, RecordDefaults, UserId, ensure};
pub use repository::{InviteRepository, InviteSnapshotRepository};
pub use store::{Collection, DocumentStore, UpsertOp};
