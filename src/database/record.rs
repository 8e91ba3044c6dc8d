//! Record defaulter.
//!
//! Stored documents may predate the current schema. Every record passes
//! through [`ensure`] on its way into the cache: absent fields are filled
//! from the record's default, legacy shapes are repaired, and the result is
//! decoded into the typed record. Fields that are already present are never
//! overwritten, so a record self-heals on first touch without a migration.

use std::fmt::Debug;
use std::hash::Hash;

use mongodb::bson::{self, Bson, Document};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::models::default_automod;
use super::store::{Collection, UpsertOp};
use crate::error::{CacheError, Result};

/// Tenant (guild) identifier.
pub type GuildId = i64;

/// User identifier.
pub type UserId = i64;

/// Configurable default values used when building fresh records.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDefaults {
    /// Moderation sub-document of a new guild config.
    pub automod: Document,
    /// Prefix given to tenants that have none stored.
    pub prefix: String,
}

impl Default for RecordDefaults {
    fn default() -> Self {
        Self {
            automod: default_automod(),
            prefix: "e!".to_string(),
        }
    }
}

/// A cached record family member with a current schema.
pub trait Record: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Identifier, unique within the family.
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Collection the family is persisted to.
    const COLLECTION: Collection;

    fn key(&self) -> Self::Key;

    /// Read the identifier out of a raw stored document.
    fn key_of(doc: &Document) -> Result<Self::Key>;

    /// Filter matching exactly the stored document for `key`.
    fn filter(key: &Self::Key) -> Document;

    /// A record with every field at its documented default.
    fn with_defaults(key: &Self::Key, defaults: &RecordDefaults) -> Self;

    /// Fix legacy shapes that backfilling alone cannot handle.
    ///
    /// Runs after missing fields were filled. Returns whether the document
    /// changed.
    fn repair(_doc: &mut Document) -> bool {
        false
    }

    /// Every current-schema field except the identifier, for a `$set`.
    fn set_fields(&self) -> Result<Document> {
        let mut doc = bson::to_document(self)?;
        for field in Self::filter(&self.key()).keys() {
            doc.remove(field);
        }
        doc.remove("_id");
        Ok(doc)
    }

    /// Idempotent upsert writing this record's full state.
    fn upsert_op(&self) -> Result<UpsertOp> {
        Ok(UpsertOp::new(Self::filter(&self.key()), self.set_fields()?))
    }
}

/// Outcome of [`ensure`].
#[derive(Debug, Clone)]
pub struct Ensured<R> {
    pub record: R,
    /// Whether the record differs from what was stored and needs writing back.
    pub modified: bool,
}

/// Produce a complete current-schema record from a stored document, or a
/// fresh default record when nothing is stored.
///
/// Nested sub-documents that are entirely absent are inserted wholesale
/// from the default.
pub fn ensure<R: Record>(
    raw: Option<Document>,
    key: &R::Key,
    defaults: &RecordDefaults,
) -> Result<Ensured<R>> {
    let Some(mut doc) = raw else {
        return Ok(Ensured {
            record: R::with_defaults(key, defaults),
            modified: true,
        });
    };

    let template = bson::to_document(&R::with_defaults(key, defaults))?;
    let mut modified = false;

    for (field, value) in &template {
        if !doc.contains_key(field) {
            doc.insert(field.clone(), value.clone());
            modified = true;
        }
    }

    if R::repair(&mut doc) {
        modified = true;
    }

    let record = match bson::from_document(doc.clone()) {
        Ok(record) => record,
        Err(_) => {
            reset_unreadable_fields::<R>(&mut doc, &template);
            modified = true;
            bson::from_document(doc)?
        }
    };
    Ok(Ensured { record, modified })
}

/// Replace every field whose stored value does not fit the schema with its
/// default. Fields unknown to the schema are left alone.
fn reset_unreadable_fields<R: Record>(doc: &mut Document, template: &Document) {
    for (field, default) in template {
        let Some(stored) = doc.get(field) else {
            continue;
        };

        let mut trial = template.clone();
        trial.insert(field.clone(), stored.clone());
        if bson::from_document::<R>(trial).is_err() {
            warn!(
                "Resetting unreadable field '{}' of a {} record to its default",
                field,
                R::COLLECTION
            );
            doc.insert(field.clone(), default.clone());
        }
    }
}

/// Read an integer identifier field, accepting any integral BSON width.
pub(crate) fn int_field(doc: &Document, collection: Collection, field: &'static str) -> Result<i64> {
    match doc.get(field) {
        Some(Bson::Int64(v)) => Ok(*v),
        Some(Bson::Int32(v)) => Ok(i64::from(*v)),
        Some(Bson::Double(v)) if v.fract() == 0.0 => Ok(*v as i64),
        _ => Err(CacheError::MissingKey {
            collection: collection.name(),
            field,
        }),
    }
}
