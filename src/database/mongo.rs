//! MongoDB database wrapper.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::{ClientOptions, UpdateOptions};
use mongodb::{Client, Collection as MongoCollection};
use tracing::{debug, info};

use super::store::{Collection, DocumentStore, UpsertOp};
use crate::error::{CacheError, Result};

/// Upper bound on operations sent in one `update` command.
///
/// Keeps a single command well under the server's 16 MiB message limit when
/// guild configs are large.
const BULK_CHUNK: usize = 1_000;

/// Database wrapper for MongoDB operations.
#[derive(Debug, Clone)]
pub struct Database {
    db: mongodb::Database,
}

impl Database {
    /// Connect to MongoDB with the given URI and database name.
    ///
    /// # Arguments
    /// * `uri` - MongoDB connection string
    /// * `db_name` - Database name to use
    ///
    /// # Errors
    /// Returns `StoreUnavailable` if the connection or the initial ping fails.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;

        // Ping the database to verify connection
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        info!("Successfully connected to MongoDB");

        let db = client.database(db_name);

        Ok(Self { db })
    }

    fn collection(&self, collection: Collection) -> MongoCollection<Document> {
        self.db.collection(collection.name())
    }
}

#[async_trait]
impl DocumentStore for Database {
    async fn find_all(&self, collection: Collection) -> Result<Vec<Document>> {
        let cursor = self.collection(collection).find(doc! {}).await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        debug!("Fetched {} documents from {}", docs.len(), collection);
        Ok(docs)
    }

    async fn find_one(&self, collection: Collection, filter: Document) -> Result<Option<Document>> {
        Ok(self.collection(collection).find_one(filter).await?)
    }

    async fn insert_one(&self, collection: Collection, doc: Document) -> Result<()> {
        self.collection(collection).insert_one(doc).await?;
        Ok(())
    }

    async fn update_one(&self, collection: Collection, filter: Document, set: Document) -> Result<()> {
        let options = UpdateOptions::builder().upsert(true).build();

        self.collection(collection)
            .update_one(filter, doc! { "$set": set })
            .with_options(options)
            .await?;

        Ok(())
    }

    /// Sends raw `update` commands so the batch works on every server
    /// version, not only those supporting the client-level bulk write API.
    async fn bulk_upsert(&self, collection: Collection, ops: Vec<UpsertOp>) -> Result<()> {
        let mut failed = 0;

        for chunk in ops.chunks(BULK_CHUNK) {
            let updates: Vec<Bson> = chunk
                .iter()
                .map(|op| {
                    Bson::Document(doc! {
                        "q": op.filter.clone(),
                        "u": { "$set": op.set.clone() },
                        "upsert": true,
                    })
                })
                .collect();

            let reply = self
                .db
                .run_command(doc! {
                    "update": collection.name(),
                    "updates": updates,
                    "ordered": false,
                })
                .await?;

            if let Ok(errors) = reply.get_array("writeErrors") {
                failed += errors.len();
            }
        }

        if failed > 0 {
            return Err(CacheError::BulkWrite {
                collection: collection.name(),
                failed,
            });
        }

        debug!("Bulk upserted {} documents into {}", ops.len(), collection);
        Ok(())
    }

    async fn delete_one(&self, collection: Collection, filter: Document) -> Result<bool> {
        let result = self.collection(collection).delete_one(filter).await?;
        Ok(result.deleted_count > 0)
    }
}
