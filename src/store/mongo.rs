//! MongoDB implementation of [`DocumentStore`].

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::options::{ClientOptions, Credential, ReplaceOptions, ServerAddress};
use mongodb::results::UpdateResult;
use mongodb::{Client, Database};

use crate::config::MongoConfig;
use crate::error::AppError;
use crate::store::{Collection, DocumentStore, WriteOutcome};

/// Document store backed by a MongoDB database.
pub struct MongoDocumentStore {
    client: Client,
    database: Database,
}

impl MongoDocumentStore {
    /// Builds a client from the configured address and credentials.
    ///
    /// The driver connects lazily; this only fails on missing credentials or
    /// invalid options.
    pub fn connect(config: &MongoConfig) -> Result<Self, AppError> {
        let (username, password) = config.credentials()?;

        let credential = Credential::builder()
            .username(username.to_string())
            .password(password.to_string())
            .build();
        let options = ClientOptions::builder()
            .hosts(vec![ServerAddress::Tcp {
                host: config.address.clone(),
                port: Some(config.port),
            }])
            .credential(credential)
            .app_name("graphbridge".to_string())
            .build();

        let client = Client::with_options(options)?;
        let database = client.database(&config.database);

        tracing::info!(
            address = %config.address,
            port = config.port,
            database = %config.database,
            "Created MongoDB client"
        );

        Ok(Self { client, database })
    }

    /// Returns the underlying driver client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn collection(&self, name: &str) -> Result<mongodb::Collection<Document>, AppError> {
        let collection: Collection = name.parse()?;
        Ok(self.database.collection(collection.name()))
    }
}

fn outcome(result: UpdateResult) -> WriteOutcome {
    WriteOutcome {
        matched: result.matched_count,
        modified: result.modified_count,
        upserted_id: result.upserted_id,
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn find_all(&self, collection: &str) -> Result<Vec<Document>, AppError> {
        let cursor = self.collection(collection)?.find(None, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_one(&self, collection: &str, id: Bson) -> Result<Option<Document>, AppError> {
        Ok(self
            .collection(collection)?
            .find_one(doc! { "_id": id }, None)
            .await?)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, AppError> {
        let result = self.collection(collection)?.insert_one(document, None).await?;
        tracing::debug!(collection, id = %result.inserted_id, "Inserted document");
        Ok(result.inserted_id)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<WriteOutcome, AppError> {
        let result = self
            .collection(collection)?
            .update_one(filter, doc! { "$set": update }, None)
            .await?;
        Ok(outcome(result))
    }

    async fn update_one_push(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<WriteOutcome, AppError> {
        let result = self
            .collection(collection)?
            .update_one(filter, doc! { "$push": update }, None)
            .await?;
        Ok(outcome(result))
    }

    async fn upsert_one(
        &self,
        collection: &str,
        filter: Document,
        document: Document,
    ) -> Result<WriteOutcome, AppError> {
        let options = ReplaceOptions::builder().upsert(true).build();
        let result = self
            .collection(collection)?
            .replace_one(filter, document, options)
            .await?;
        Ok(outcome(result))
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64, AppError> {
        let result = self.collection(collection)?.delete_one(filter, None).await?;
        Ok(result.deleted_count)
    }

    async fn delete_all(&self, collection: &str) -> Result<u64, AppError> {
        let result = self.collection(collection)?.delete_many(doc! {}, None).await?;
        tracing::debug!(collection, deleted = result.deleted_count, "Emptied collection");
        Ok(result.deleted_count)
    }
}
