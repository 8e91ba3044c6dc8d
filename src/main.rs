use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tessera::cache::{CacheStore, Readiness, cold_start};
use tessera::config::Config;
use tessera::database::{Database, DocumentStore};
use tessera::flush;
use tessera::prefix::PrefixResolver;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tessera=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Tessera cache core...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    info!("Connecting to MongoDB...");
    let db = Database::connect(&config.mongodb_uri, &config.mongodb_database).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(db);
    info!("Database connected");

    let cache = Arc::new(CacheStore::new(config.record_defaults()));
    let readiness = Arc::new(Readiness::new());

    // Nothing may read the cache before this succeeds
    let report = match cold_start(&cache, store.as_ref(), &readiness).await {
        Ok(report) => report,
        Err(e) => {
            error!("Cold start failed: {}", e);
            return Err(e.into());
        }
    };
    info!(
        "Cache loaded: {} guild configs, {} profiles, {} blacklisted users, {} reminders",
        report.guild_configs.loaded, report.user_profiles.loaded, report.blacklisted, report.reminders
    );

    let flusher = flush::spawn(&cache, Arc::clone(&store), Arc::clone(&readiness), config.db_update_interval);

    let prefixes = PrefixResolver::new(&cache);
    info!("Default prefixes: {:?}", prefixes.resolve_prefixes(None));

    // No gateway is attached here, so the system is ready once the cache is
    readiness.mark_ready();
    info!("System ready");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    flusher.shutdown().await;

    for status in cache.flush_status() {
        info!(
            "{}: {} records, last flush {:?}",
            status.collection, status.entries, status.last_flush
        );
    }

    Ok(())
}
