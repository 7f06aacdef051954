//! Document store holding the persisted connection configuration.
//!
//! Access is scoped to a fixed allow-list of collections (see
//! [`Collection`]); any other name is rejected with
//! [`AppError::Validation`] before the backend is touched.

mod memory;
mod mongo;

use std::str::FromStr;

use async_trait::async_trait;
use bson::{Bson, Document};

use crate::error::AppError;

pub use memory::MemoryDocumentStore;
pub use mongo::MongoDocumentStore;

/// Collections this crate is allowed to read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Graph database connection documents.
    GraphDbConnection,
}

impl Collection {
    pub const ALL: &'static [Collection] = &[Collection::GraphDbConnection];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::GraphDbConnection => "graphDbConnection",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| {
                let allowed: Vec<&str> = Collection::ALL.iter().map(|c| c.name()).collect();
                AppError::Validation(format!(
                    "value of 'collection' must be in [{}], got '{}'",
                    allowed.join(", "),
                    s
                ))
            })
    }
}

/// Outcome of an update or replace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOutcome {
    pub matched: u64,
    pub modified: u64,
    /// Id of the document inserted by an upsert.
    pub upserted_id: Option<Bson>,
}

/// CRUD access to an allow-listed document collection.
///
/// Filters are plain equality documents (`{"_id": id}`, `{"type": "NEO4J"}`).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document in the collection.
    async fn find_all(&self, collection: &str) -> Result<Vec<Document>, AppError>;

    /// The document whose `_id` equals `id`.
    async fn find_one(&self, collection: &str, id: Bson) -> Result<Option<Document>, AppError>;

    /// Inserts a document and returns its `_id`.
    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, AppError>;

    /// Sets the fields of `update` on the first matching document.
    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<WriteOutcome, AppError>;

    /// Appends each value of `update` to the array field of the same name on
    /// the first matching document.
    async fn update_one_push(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<WriteOutcome, AppError>;

    /// Replaces the first matching document, inserting it when none matches.
    async fn upsert_one(
        &self,
        collection: &str,
        filter: Document,
        document: Document,
    ) -> Result<WriteOutcome, AppError>;

    /// Deletes the first matching document and returns the number deleted.
    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64, AppError>;

    /// Empties the collection and returns the number deleted.
    async fn delete_all(&self, collection: &str) -> Result<u64, AppError>;
}
