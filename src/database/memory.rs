//! In-memory document store.
//!
//! Mirrors the subset of MongoDB semantics the cache core relies on:
//! equality filters and `$set` upserts. Used by tests and by tools that
//! exercise the cache without a database.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use mongodb::bson::Document;
use parking_lot::Mutex;

use super::store::{Collection, DocumentStore, UpsertOp};
use crate::error::{CacheError, Result};

/// Document store kept entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<Collection, Vec<Document>>>,
    unavailable: AtomicBool,
    bulk_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection with documents, bypassing the store contract.
    pub fn seed(&self, collection: Collection, docs: impl IntoIterator<Item = Document>) {
        self.collections
            .lock()
            .entry(collection)
            .or_default()
            .extend(docs);
    }

    /// Every document currently held in `collection`.
    pub fn documents(&self, collection: Collection) -> Vec<Document> {
        self.collections
            .lock()
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Make every subsequent call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `bulk_upsert` calls that reached the store.
    pub fn bulk_calls(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::StoreUnavailable(Box::new(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "memory store marked unavailable",
            ))));
        }
        Ok(())
    }
}

fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, value)| doc.get(key) == Some(value))
}

fn apply_upsert(docs: &mut Vec<Document>, op: &UpsertOp) {
    match docs.iter_mut().find(|doc| matches(doc, &op.filter)) {
        Some(doc) => {
            for (key, value) in &op.set {
                doc.insert(key.clone(), value.clone());
            }
        }
        None => {
            let mut doc = op.filter.clone();
            for (key, value) in &op.set {
                doc.insert(key.clone(), value.clone());
            }
            docs.push(doc);
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_all(&self, collection: Collection) -> Result<Vec<Document>> {
        self.check_available()?;
        Ok(self.documents(collection))
    }

    async fn find_one(&self, collection: Collection, filter: Document) -> Result<Option<Document>> {
        self.check_available()?;
        let collections = self.collections.lock();
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|doc| matches(doc, &filter)).cloned()))
    }

    async fn insert_one(&self, collection: Collection, doc: Document) -> Result<()> {
        self.check_available()?;
        self.collections.lock().entry(collection).or_default().push(doc);
        Ok(())
    }

    async fn update_one(&self, collection: Collection, filter: Document, set: Document) -> Result<()> {
        self.check_available()?;
        let mut collections = self.collections.lock();
        apply_upsert(collections.entry(collection).or_default(), &UpsertOp::new(filter, set));
        Ok(())
    }

    async fn bulk_upsert(&self, collection: Collection, ops: Vec<UpsertOp>) -> Result<()> {
        self.check_available()?;
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        let mut collections = self.collections.lock();
        let docs = collections.entry(collection).or_default();
        for op in &ops {
            apply_upsert(docs, op);
        }
        Ok(())
    }

    async fn delete_one(&self, collection: Collection, filter: Document) -> Result<bool> {
        self.check_available()?;
        let mut collections = self.collections.lock();
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(false);
        };
        match docs.iter().position(|doc| matches(doc, &filter)) {
            Some(pos) => {
                docs.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[tokio::test]
    async fn test_update_one_upserts_then_sets() {
        let store = MemoryStore::new();

        store
            .update_one(Collection::Prefixes, doc! { "_id": 1_i64 }, doc! { "prefix": ["!"] })
            .await
            .unwrap();
        store
            .update_one(Collection::Prefixes, doc! { "_id": 1_i64 }, doc! { "note": "x" })
            .await
            .unwrap();

        let docs = store.documents(Collection::Prefixes);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0], doc! { "_id": 1_i64, "prefix": ["!"], "note": "x" });
    }

    #[tokio::test]
    async fn test_unavailable_rejects_calls() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        let err = store.find_all(Collection::Invites).await.unwrap_err();
        assert!(err.is_store_failure());

        store.set_unavailable(false);
        assert!(store.find_all(Collection::Invites).await.unwrap().is_empty());
    }
}
