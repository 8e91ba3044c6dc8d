//! Tessera - write-back cache core for a multi-tenant chat bot
//!
//! Keeps hot per-guild and per-user records in memory, writes them back to
//! MongoDB on a timer, and answers prefix lookups without a round trip.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - MongoDB integration, record models and the defaulter
//! - `cache` - Write-back families, readiness gates and the cold-start loader
//! - `flush` - Periodic bulk write-back of every family
//! - `prefix` - Command prefix resolution
//! - `error` - Shared error type

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod flush;
pub mod prefix;

pub use error::{CacheError, Result};
