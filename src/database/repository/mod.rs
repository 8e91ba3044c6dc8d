//! Repository module - store-backed data access outside the write-back families.

mod invite_repository;
mod invite_snapshot_repository;

pub use invite_repository::InviteRepository;
pub use invite_snapshot_repository::{InviteSnapshotRepository, InviteUses};
