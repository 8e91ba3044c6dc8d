//! Flush scheduler.
//!
//! One independently timed loop per write-back family. Each tick takes a
//! point-in-time snapshot of the family, turns every record into a `$set`
//! upsert and sends the batch as one bulk write. Writes overwrite, so
//! repeating a flush without mutations leaves the store unchanged.
//!
//! A failed tick is logged and dropped; the records are still in memory and
//! go out with the next tick. Ticks never queue up behind a slow write.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheStore, Family, Readiness};
use crate::database::{DocumentStore, Record};
use crate::error::Result;

/// Write every record of `family` to the store in one bulk upsert.
///
/// Empty families issue no write. The flush time is recorded only when the
/// write succeeded. Returns the number of records written.
pub async fn flush_family<R: Record>(family: &Family<R>, store: &dyn DocumentStore) -> Result<usize> {
    // Built synchronously: nothing yields between reading the first and
    // the last record.
    let ops = family.upsert_ops()?;
    let count = ops.len();

    if count > 0 {
        store.bulk_upsert(R::COLLECTION, ops).await?;
    }

    family.mark_flushed(Utc::now());
    Ok(count)
}

/// Handle to the running flush loops.
pub struct FlushHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl FlushHandle {
    /// Stop every loop and wait for them.
    ///
    /// A bulk write already in flight completes first. No final flush is
    /// made, so changes since each family's last tick are not persisted.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Flush task ended abnormally: {}", e);
            }
        }
        info!("Flush scheduler stopped");
    }
}

/// Start one flush loop per family.
///
/// Loops first wait for system readiness, then tick every `interval`. A tick
/// while the cache gate is still closed does nothing. Dropping the handle
/// stops the loops at their next interval boundary.
pub fn spawn(
    cache: &CacheStore,
    store: Arc<dyn DocumentStore>,
    readiness: Arc<Readiness>,
    interval: Duration,
) -> FlushHandle {
    let (shutdown, rx) = watch::channel(false);

    let tasks = vec![
        spawn_family(Arc::clone(cache.guild_configs()), &store, &readiness, interval, rx.clone()),
        spawn_family(Arc::clone(cache.prefixes()), &store, &readiness, interval, rx.clone()),
        spawn_family(Arc::clone(cache.leveling()), &store, &readiness, interval, rx.clone()),
        spawn_family(Arc::clone(cache.user_profiles()), &store, &readiness, interval, rx),
    ];

    info!("Flush scheduler started ({}s interval)", interval.as_secs());
    FlushHandle { shutdown, tasks }
}

fn spawn_family<R: Record>(
    family: Arc<Family<R>>,
    store: &Arc<dyn DocumentStore>,
    readiness: &Arc<Readiness>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let store = Arc::clone(store);
    let readiness = Arc::clone(readiness);

    tokio::spawn(async move {
        tokio::select! {
            _ = readiness.wait_until_ready() => {}
            _ = shutdown.changed() => return,
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            if !readiness.is_cache_loaded() {
                debug!("Skipping {} flush: cache not loaded", R::COLLECTION);
                continue;
            }

            match flush_family(&family, store.as_ref()).await {
                Ok(count) => debug!("Flushed {} records to {}", count, R::COLLECTION),
                Err(e) => error!("Flush of {} failed: {}", R::COLLECTION, e),
            }
        }

        debug!("Flush loop for {} stopped", R::COLLECTION);
    })
}
