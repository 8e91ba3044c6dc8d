//! Cold-start loader.
//!
//! Reads every write-back family, the blacklist and the reminders in full
//! before anything may read the cache. Nothing becomes visible unless every
//! collection was fetched; on a store failure the cache gate stays closed.
//! Single documents that cannot be read are logged and left out.

use tracing::{info, warn};

use super::family::{Family, LoadStats};
use super::{CacheStore, Readiness};
use crate::database::{Collection, DocumentStore, Record, int_field};
use crate::error::{CacheError, Result};

/// What the cold start loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub prefixes: LoadStats,
    pub guild_configs: LoadStats,
    pub leveling: LoadStats,
    pub user_profiles: LoadStats,
    pub blacklisted: usize,
    pub reminders: usize,
}

/// Load every family from `store` into `cache`, then open the cache gate.
///
/// # Errors
/// Any store failure aborts the load; the process must not continue with
/// the gate closed.
pub async fn cold_start(
    cache: &CacheStore,
    store: &dyn DocumentStore,
    readiness: &Readiness,
) -> Result<LoadReport> {
    if readiness.is_cache_loaded() {
        return Err(CacheError::InvariantViolation(
            "cold start ran after the cache was loaded".into(),
        ));
    }

    let prefix_docs = store.find_all(Collection::Prefixes).await?;
    let config_docs = store.find_all(Collection::ServerConfig).await?;
    let leveling_docs = store.find_all(Collection::Leveling).await?;
    let profile_docs = store.find_all(Collection::UserProfile).await?;
    let blacklist_docs = store.find_all(Collection::Blacklisted).await?;
    let reminders = store.find_all(Collection::Reminders).await?;

    let prefixes = cache.prefixes().prepare(prefix_docs);
    let configs = cache.guild_configs().prepare(config_docs);
    let leveling = cache.leveling().prepare(leveling_docs);
    let profiles = cache.user_profiles().prepare(profile_docs);
    let blacklisted: Vec<_> = blacklist_docs
        .iter()
        .filter_map(|doc| match int_field(doc, Collection::Blacklisted, "_id") {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Skipping blacklist document: {}", e);
                None
            }
        })
        .collect();

    let report = LoadReport {
        prefixes: populate(cache.prefixes(), prefixes),
        guild_configs: populate(cache.guild_configs(), configs),
        leveling: populate(cache.leveling(), leveling),
        user_profiles: populate(cache.user_profiles(), profiles),
        blacklisted: blacklisted.len(),
        reminders: reminders.len(),
    };
    cache.replace_blacklist(blacklisted);
    cache.replace_reminders(reminders);

    info!("Prefixes cache has been loaded | {} items", report.prefixes.loaded);
    info!("Server config cache has been loaded | {} configs", report.guild_configs.loaded);
    info!("Reminders cache has been loaded | {} reminders", report.reminders);
    info!("Leveling cache has been loaded | {} items", report.leveling.loaded);
    info!("User profile cache has been loaded | {} profiles", report.user_profiles.loaded);
    info!("Blacklisted users cache has been loaded | {} users", report.blacklisted);

    let healed = report.prefixes.healed
        + report.guild_configs.healed
        + report.leveling.healed
        + report.user_profiles.healed;
    if healed > 0 {
        warn!("{} records were backfilled to the current schema", healed);
    }

    let skipped = report.prefixes.skipped
        + report.guild_configs.skipped
        + report.leveling.skipped
        + report.user_profiles.skipped;
    if skipped > 0 {
        warn!("{} unreadable records were left out of the cache", skipped);
    }

    readiness.mark_cache_loaded();
    Ok(report)
}

fn populate<R: Record>(family: &Family<R>, (records, stats): (Vec<R>, LoadStats)) -> LoadStats {
    family.populate(records);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryStore, RecordDefaults};
    use mongodb::bson::doc;

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.seed(Collection::Prefixes, [doc! { "_id": 1_i64, "prefix": "e!" }]);
        store.seed(
            Collection::ServerConfig,
            [doc! { "_id": 1_i64, "disabled_cmds": ["ban"], "nqn": true }],
        );
        store.seed(
            Collection::Leveling,
            [doc! { "id": 5_i64, "guild_id": 1_i64, "xp": 12_i64, "messages": 3_i64 }],
        );
        store.seed(Collection::UserProfile, [doc! { "_id": 5_i64, "hugs": 2_i64 }]);
        store.seed(Collection::Blacklisted, [doc! { "_id": 666_i64 }]);
        store.seed(Collection::Reminders, [doc! { "_id": 1_i64, "user_id": 5_i64, "time": 1_700_000_000_i64 }]);
        store
    }

    #[tokio::test]
    async fn test_cold_start_loads_every_family() {
        let store = seeded_store();
        let cache = CacheStore::new(RecordDefaults::default());
        let readiness = Readiness::new();

        let report = cold_start(&cache, &store, &readiness).await.unwrap();

        assert!(readiness.is_cache_loaded());
        assert_eq!(report.prefixes, LoadStats { loaded: 1, healed: 1, skipped: 0 });
        assert_eq!(report.guild_configs.loaded, 1);
        assert_eq!(report.leveling, LoadStats { loaded: 1, healed: 0, skipped: 0 });
        assert_eq!(report.user_profiles.loaded, 1);
        assert_eq!(report.blacklisted, 1);
        assert_eq!(report.reminders, 1);
        assert_eq!(cache.reminders()[0].get_i64("user_id").unwrap(), 5);

        assert_eq!(cache.prefixes().get(&1).unwrap().prefix, vec!["e!".to_string()]);
        assert!(cache.guild_configs().get(&1).unwrap().nqn);
        assert_eq!(cache.get_or_default_leveling(5, 1).xp, 12);
        assert_eq!(cache.get_or_default_user_profile(5).interaction("hugs"), 2);
        assert!(cache.is_blacklisted(666));
    }

    #[tokio::test]
    async fn test_cold_start_failure_keeps_gate_closed() {
        let store = seeded_store();
        store.set_unavailable(true);
        let cache = CacheStore::new(RecordDefaults::default());
        let readiness = Readiness::new();

        let err = cold_start(&cache, &store, &readiness).await.unwrap_err();
        assert!(err.is_store_failure());
        assert!(!readiness.is_cache_loaded());
        assert!(cache.prefixes().is_empty());
    }

    #[tokio::test]
    async fn test_cold_start_tolerates_odd_documents() {
        let store = seeded_store();
        store.seed(Collection::ServerConfig, [doc! { "nqn": true }]);
        store.seed(
            Collection::UserProfile,
            [
                doc! { "_id": 6_i64, "married_to": 7_i64, "married_at": 1_700_000_000.25 },
                doc! { "_id": 8_i64, "snipe": "off", "cmds_used": 3_i64 },
            ],
        );
        let cache = CacheStore::new(RecordDefaults::default());
        let readiness = Readiness::new();

        let report = cold_start(&cache, &store, &readiness).await.unwrap();
        assert!(readiness.is_cache_loaded());
        assert_eq!(report.guild_configs, LoadStats { loaded: 1, healed: 1, skipped: 1 });
        assert_eq!(report.user_profiles.loaded, 3);

        let paired = cache.user_profiles().get(&6).unwrap().partner();
        assert_eq!(paired, Some((7, 1_700_000_000)));
        let reset = cache.user_profiles().get(&8).unwrap().clone();
        assert!(reset.snipe);
        assert_eq!(reset.cmds_used, 3);
    }

    #[tokio::test]
    async fn test_cold_start_runs_once() {
        let store = seeded_store();
        let cache = CacheStore::new(RecordDefaults::default());
        let readiness = Readiness::new();

        cold_start(&cache, &store, &readiness).await.unwrap();
        assert!(cold_start(&cache, &store, &readiness).await.is_err());
    }
}
