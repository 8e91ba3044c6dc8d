//! Cache module.
//!
//! ## Architecture
//!
//! - `Family` - never-evicting table of one write-back record family
//! - `CacheStore` - every family plus the blacklist, owned explicitly
//! - `Readiness` - cold-start and system readiness gates
//! - `loader` - one-shot cold-start population of the store
//! - `TypedCache` - bounded Moka read-through cache for write-through data
//!
//! ## Usage
//!
//! ```rust,ignore
//! let cache = CacheStore::new(config.record_defaults());
//! cold_start(&cache, &db, &readiness).await?;
//!
//! // Mutations are persisted by the next flush of the family.
//! cache.get_or_default_guild_config(guild_id).nqn = true;
//! ```

mod config;
mod family;
mod loader;
mod readiness;
mod store;
mod typed;

pub use config::CacheConfig;
pub use family::{Family, LoadStats};
pub use loader::{LoadReport, cold_start};
pub use readiness::Readiness;
pub use store::{CacheStore, FlushStatus};
pub use typed::TypedCache;
