//! In-memory table of one record family.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::one::{Ref, RefMut};
use mongodb::bson::{self, Document};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::database::{Collection, Record, RecordDefaults, UpsertOp, ensure};
use crate::error::{CacheError, Result};

/// Result of decoding a family's stored documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Records now held in the cache.
    pub loaded: usize,
    /// Records that were backfilled or repaired while loading.
    pub healed: usize,
    /// Stored documents left out because they could not be read.
    pub skipped: usize,
}

/// Records of one family, keyed by identifier.
///
/// Records are never evicted; everything held here is written back by the
/// family's flush loop. Accessors hand out map guards that lock one shard:
/// mutate through them and drop them before awaiting anything, and never
/// hold one while calling [`upsert_ops`](Self::upsert_ops) on the same family.
pub struct Family<R: Record> {
    entries: DashMap<R::Key, R>,
    defaults: Arc<RecordDefaults>,
    last_flush: RwLock<Option<DateTime<Utc>>>,
}

impl<R: Record> Family<R> {
    pub fn new(defaults: Arc<RecordDefaults>) -> Self {
        Self {
            entries: DashMap::new(),
            defaults,
            last_flush: RwLock::new(None),
        }
    }

    pub fn collection(&self) -> Collection {
        R::COLLECTION
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The record for `key`, created with defaults if absent.
    ///
    /// A created record is cached immediately, so the next call returns the
    /// same record.
    pub fn get_or_default(&self, key: R::Key) -> RefMut<'_, R::Key, R> {
        self.entries.entry(key.clone()).or_insert_with(|| {
            debug!("Creating default {} record for {:?}", R::COLLECTION, key);
            R::with_defaults(&key, &self.defaults)
        })
    }

    /// The record for `key` if one is cached.
    pub fn get(&self, key: &R::Key) -> Option<Ref<'_, R::Key, R>> {
        self.entries.get(key)
    }

    /// Merge loose fields into the record for `key`.
    ///
    /// Identifier fields cannot be changed. If the merged fields do not fit
    /// the schema the record is left untouched: a badly typed value returns
    /// the decode error, a field the record cannot hold returns
    /// `InvariantViolation`.
    pub fn upsert_local(&self, key: R::Key, fields: Document) -> Result<()> {
        let mut entry = self.get_or_default(key.clone());
        let filter = R::filter(&key);
        let names: Vec<String> = fields
            .keys()
            .filter(|name| name.as_str() != "_id" && !filter.contains_key(name.as_str()))
            .cloned()
            .collect();

        let mut doc = bson::to_document(&*entry)?;
        for (field, value) in fields {
            doc.insert(field, value);
        }
        for (field, value) in filter {
            doc.insert(field, value);
        }

        let updated: R = bson::from_document(doc)?;
        let written = bson::to_document(&updated)?;
        if let Some(lost) = names.iter().find(|name| !written.contains_key(name.as_str())) {
            return Err(CacheError::InvariantViolation(format!(
                "{} records have no field '{}'",
                R::COLLECTION,
                lost
            )));
        }

        *entry = updated;
        Ok(())
    }

    /// Point-in-time copy of every record. Order is unspecified.
    pub fn all(&self) -> Vec<R> {
        self.collect_where(|_| true)
    }

    /// Clones of every record matching `predicate`.
    pub fn collect_where(&self, predicate: impl Fn(&R) -> bool) -> Vec<R> {
        self.entries
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Point-in-time upsert batch covering every record.
    ///
    /// Runs to completion without yielding. Order is unspecified.
    pub fn upsert_ops(&self) -> Result<Vec<UpsertOp>> {
        self.entries
            .iter()
            .map(|entry| entry.value().upsert_op())
            .collect()
    }

    /// Decode stored documents into complete records without touching the cache.
    ///
    /// A document without a usable identifier, or one the defaulter cannot
    /// turn into a record, is logged and left out.
    pub fn prepare(&self, docs: Vec<Document>) -> (Vec<R>, LoadStats) {
        let mut records = Vec::with_capacity(docs.len());
        let mut stats = LoadStats::default();

        for doc in docs {
            let id = doc.get("_id").cloned();
            let ensured = R::key_of(&doc).and_then(|key| ensure::<R>(Some(doc), &key, &self.defaults));

            match ensured {
                Ok(ensured) => {
                    if ensured.modified {
                        stats.healed += 1;
                    }
                    records.push(ensured.record);
                }
                Err(e) => {
                    warn!("Skipping {} document {:?}: {}", R::COLLECTION, id, e);
                    stats.skipped += 1;
                }
            }
        }

        stats.loaded = records.len();
        (records, stats)
    }

    /// Insert prepared records, replacing any cached record with the same key.
    pub fn populate(&self, records: Vec<R>) {
        for record in records {
            self.entries.insert(record.key(), record);
        }
    }

    pub fn mark_flushed(&self, at: DateTime<Utc>) {
        *self.last_flush.write() = Some(at);
    }

    /// When the last flush of this family completed.
    pub fn last_flush(&self) -> Option<DateTime<Utc>> {
        *self.last_flush.read()
    }
}

impl<R: Record> std::fmt::Debug for Family<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Family")
            .field("collection", &R::COLLECTION)
            .field("len", &self.entries.len())
            .field("last_flush", &self.last_flush())
            .finish()
    }
}
