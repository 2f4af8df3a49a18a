//! MongoDB-backed document store

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, Document};
use futures::TryStreamExt;
use mongodb::options::{ClientOptions, FindOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};

use crate::error::{DbError, Result};
use crate::options::{FindSpec, IndexSpec};
use crate::store::DocumentStore;

/// Connection parameters for [`MongoStore::connect`].
#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
    pub server_selection_timeout: Duration,
    pub app_name: Option<String>,
}

/// A single collection on a MongoDB deployment.
pub struct MongoStore {
    client: Client,
    database: Database,
    collection: Collection<Document>,
    collection_name: String,
    closed: AtomicBool,
}

impl MongoStore {
    /// Open a client and confirm the deployment answers a ping.
    pub async fn connect(config: &MongoConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| DbError::connection(format!("invalid connection string: {e}")))?;
        options.server_selection_timeout = Some(config.server_selection_timeout);
        options.app_name = config.app_name.clone();

        let client = Client::with_options(options)
            .map_err(|e| DbError::connection(format!("failed to build client: {e}")))?;
        let database = client.database(&config.database);
        let collection = database.collection::<Document>(&config.collection);

        let store = Self {
            client,
            database,
            collection,
            collection_name: config.collection.clone(),
            closed: AtomicBool::new(false),
        };
        store.ping().await?;

        tracing::info!(
            target: "folio-db",
            database = %config.database,
            collection = %config.collection,
            "connected to mongodb"
        );

        Ok(store)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DbError::connection("store connection has been closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn collection_name(&self) -> &str {
        &self.collection_name
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_open()?;
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn find(&self, filter: Document, spec: FindSpec) -> Result<Vec<Document>> {
        self.ensure_open()?;
        tracing::debug!(target: "folio-db", %filter, ?spec, "find");

        let mut options = FindOptions::default();
        options.sort = spec.sort;
        options.skip = spec.skip;
        options.limit = spec.limit;
        options.projection = spec.projection;

        let cursor = self.collection.find(filter).with_options(options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_one(&self, filter: Document, update: Document) -> Result<u64> {
        self.ensure_open()?;
        tracing::debug!(target: "folio-db", %filter, %update, "update_one");

        let result = self.collection.update_one(filter, update).await?;
        Ok(result.matched_count)
    }

    async fn delete_one(&self, filter: Document) -> Result<u64> {
        self.ensure_open()?;
        tracing::debug!(target: "folio-db", %filter, "delete_one");

        let result = self.collection.delete_one(filter).await?;
        Ok(result.deleted_count)
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        self.ensure_open()?;
        tracing::debug!(target: "folio-db", stages = pipeline.len(), "aggregate");

        let cursor = self.collection.aggregate(pipeline).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn create_index(&self, index: &IndexSpec) -> Result<String> {
        self.ensure_open()?;
        if index.is_empty() {
            return Err(DbError::query("index spec names no fields"));
        }

        let mut options = IndexOptions::default();
        options.name = Some(index.name());
        let model = IndexModel::builder()
            .keys(index.keys_document())
            .options(options)
            .build();

        let result = self.collection.create_index(model).await?;
        Ok(result.index_name)
    }

    async fn list_indexes(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self.collection.list_index_names().await?)
    }

    async fn explain(&self, filter: Document) -> Result<Document> {
        self.ensure_open()?;
        let command = doc! {
            "explain": { "find": self.collection_name.as_str(), "filter": filter },
            "verbosity": "executionStats",
        };

        let response = self.database.run_command(command).await?;
        match response.get_document("executionStats") {
            Ok(stats) => Ok(stats.clone()),
            Err(_) => Ok(response),
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.client.clone().shutdown().await;
        tracing::info!(target: "folio-db", "mongodb connection closed");
    }
}
