//! In-memory [`DocumentStore`], for tests and for embedders that seed the
//! connection configuration programmatically.

use std::collections::HashMap;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use parking_lot::Mutex;

use crate::error::AppError;
use crate::store::{Collection, DocumentStore, WriteOutcome};

/// Document store kept in process memory.
///
/// Filters match by top-level field equality, which covers every filter this
/// crate issues.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<HashMap<Collection, Vec<Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose `graphDbConnection` collection holds `documents`.
    pub fn with_connection_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let store = Self::new();
        store
            .collections
            .lock()
            .insert(Collection::GraphDbConnection, documents.into_iter().map(with_id).collect());
        store
    }

    fn with_collection<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Vec<Document>) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let collection: Collection = name.parse()?;
        let mut collections = self.collections.lock();
        f(collections.entry(collection).or_default())
    }
}

fn with_id(mut document: Document) -> Document {
    if !document.contains_key("_id") {
        document.insert("_id", ObjectId::new());
    }
    document
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, value)| document.get(key) == Some(value))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find_all(&self, collection: &str) -> Result<Vec<Document>, AppError> {
        self.with_collection(collection, |docs| Ok(docs.clone()))
    }

    async fn find_one(&self, collection: &str, id: Bson) -> Result<Option<Document>, AppError> {
        self.with_collection(collection, |docs| {
            Ok(docs.iter().find(|d| d.get("_id") == Some(&id)).cloned())
        })
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, AppError> {
        self.with_collection(collection, |docs| {
            let document = with_id(document);
            let id = document.get("_id").cloned().unwrap_or(Bson::Null);
            if docs.iter().any(|d| d.get("_id") == Some(&id)) {
                return Err(AppError::Validation(format!("duplicate _id {}", id)));
            }
            docs.push(document);
            Ok(id)
        })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<WriteOutcome, AppError> {
        self.with_collection(collection, |docs| {
            let Some(document) = docs.iter_mut().find(|d| matches(d, &filter)) else {
                return Ok(WriteOutcome::default());
            };
            let before = document.clone();
            for (key, value) in update {
                document.insert(key, value);
            }
            Ok(WriteOutcome {
                matched: 1,
                modified: u64::from(*document != before),
                upserted_id: None,
            })
        })
    }

    async fn update_one_push(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<WriteOutcome, AppError> {
        self.with_collection(collection, |docs| {
            let Some(document) = docs.iter_mut().find(|d| matches(d, &filter)) else {
                return Ok(WriteOutcome::default());
            };
            for (key, value) in update {
                match document.get_mut(&key) {
                    Some(Bson::Array(items)) => items.push(value),
                    Some(other) => {
                        return Err(AppError::Validation(format!(
                            "field '{}' is not an array: {}",
                            key, other
                        )))
                    }
                    None => {
                        document.insert(key, Bson::Array(vec![value]));
                    }
                }
            }
            Ok(WriteOutcome {
                matched: 1,
                modified: 1,
                upserted_id: None,
            })
        })
    }

    async fn upsert_one(
        &self,
        collection: &str,
        filter: Document,
        mut document: Document,
    ) -> Result<WriteOutcome, AppError> {
        self.with_collection(collection, |docs| {
            if let Some(existing) = docs.iter_mut().find(|d| matches(d, &filter)) {
                if let Some(id) = existing.get("_id").cloned() {
                    document.insert("_id", id);
                }
                let modified = u64::from(*existing != document);
                *existing = document;
                return Ok(WriteOutcome {
                    matched: 1,
                    modified,
                    upserted_id: None,
                });
            }

            if let (false, Some(id)) = (document.contains_key("_id"), filter.get("_id")) {
                document.insert("_id", id.clone());
            }
            let document = with_id(document);
            let id = document.get("_id").cloned();
            docs.push(document);
            Ok(WriteOutcome {
                matched: 0,
                modified: 0,
                upserted_id: id,
            })
        })
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64, AppError> {
        self.with_collection(collection, |docs| {
            match docs.iter().position(|d| matches(d, &filter)) {
                Some(index) => {
                    docs.remove(index);
                    Ok(1)
                }
                None => Ok(0),
            }
        })
    }

    async fn delete_all(&self, collection: &str) -> Result<u64, AppError> {
        self.with_collection(collection, |docs| {
            let deleted = docs.len() as u64;
            docs.clear();
            Ok(deleted)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    const COLLECTION: &str = "graphDbConnection";

    #[tokio::test]
    async fn test_insert_then_find() {
        let store = MemoryDocumentStore::new();
        let id = store
            .insert_one(COLLECTION, doc! { "type": "NEO4J", "uri": "localhost" })
            .await
            .unwrap();

        let found = store.find_one(COLLECTION, id.clone()).await.unwrap().unwrap();
        assert_eq!(found.get_str("type").unwrap(), "NEO4J");
        assert_eq!(store.find_all(COLLECTION).await.unwrap().len(), 1);
        assert!(store
            .insert_one(COLLECTION, doc! { "_id": id })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_rejects_unknown_collection() {
        let store = MemoryDocumentStore::new();
        let result = store.insert_one("users", doc! { "name": "Edward" }).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_sets_fields() {
        let store = MemoryDocumentStore::with_connection_documents([doc! {
            "_id": 1, "type": "NEO4J", "port": 7687
        }]);

        let outcome = store
            .update_one(COLLECTION, doc! { "_id": 1 }, doc! { "port": 7688 })
            .await
            .unwrap();
        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.modified, 1);

        let doc = store.find_one(COLLECTION, Bson::Int32(1)).await.unwrap().unwrap();
        assert_eq!(doc.get_i32("port").unwrap(), 7688);

        let missing = store
            .update_one(COLLECTION, doc! { "_id": 2 }, doc! { "port": 1 })
            .await
            .unwrap();
        assert_eq!(missing, WriteOutcome::default());
    }

    #[tokio::test]
    async fn test_push_appends_or_creates_array() {
        let store = MemoryDocumentStore::with_connection_documents([doc! {
            "_id": 1, "tags": ["a"], "type": "NEO4J"
        }]);

        store
            .update_one_push(COLLECTION, doc! { "_id": 1 }, doc! { "tags": "b", "notes": "x" })
            .await
            .unwrap();
        let doc = store.find_one(COLLECTION, Bson::Int32(1)).await.unwrap().unwrap();
        assert_eq!(doc.get_array("tags").unwrap().len(), 2);
        assert_eq!(doc.get_array("notes").unwrap().len(), 1);

        let result = store
            .update_one_push(COLLECTION, doc! { "_id": 1 }, doc! { "type": "x" })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_upsert_replaces_or_inserts() {
        let store = MemoryDocumentStore::new();

        let inserted = store
            .upsert_one(COLLECTION, doc! { "_id": "conn" }, doc! { "type": "NEO4J" })
            .await
            .unwrap();
        assert_eq!(inserted.upserted_id, Some(Bson::String("conn".into())));

        let replaced = store
            .upsert_one(COLLECTION, doc! { "_id": "conn" }, doc! { "type": "JANUSGRAPH" })
            .await
            .unwrap();
        assert_eq!(replaced.matched, 1);
        assert_eq!(replaced.upserted_id, None);

        let all = store.find_all(COLLECTION).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].get_str("type").unwrap(), "JANUSGRAPH");
    }

    #[tokio::test]
    async fn test_delete_one_and_all() {
        let store = MemoryDocumentStore::with_connection_documents([
            doc! { "type": "NEO4J" },
            doc! { "type": "NEO4J" },
            doc! { "type": "COSMOSDB" },
        ]);

        assert_eq!(store.delete_one(COLLECTION, doc! { "type": "NEO4J" }).await.unwrap(), 1);
        assert_eq!(store.delete_one(COLLECTION, doc! { "type": "GONE" }).await.unwrap(), 0);
        assert_eq!(store.delete_all(COLLECTION).await.unwrap(), 2);
        assert!(store.find_all(COLLECTION).await.unwrap().is_empty());
    }
}
