use async_trait::async_trait;
use bson::Document;

use crate::error::Result;
use crate::options::{FindSpec, IndexSpec};

/// A single document collection behind an external store.
///
/// Every call may cross a network boundary. Implementations hold no state
/// beyond their connection handle and are safe to share across tasks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Name of the collection this store reads and writes.
    fn collection_name(&self) -> &str;

    /// Round-trip to the store to confirm it is reachable.
    async fn ping(&self) -> Result<()>;

    /// Return every document matching `filter`, shaped by `spec`.
    async fn find(&self, filter: Document, spec: FindSpec) -> Result<Vec<Document>>;

    /// Apply `update` to the first document matching `filter`.
    ///
    /// Returns the number of documents matched (0 or 1), so re-applying an
    /// update that changes nothing still reports 1.
    async fn update_one(&self, filter: Document, update: Document) -> Result<u64>;

    /// Remove the first document matching `filter`; returns 0 or 1.
    async fn delete_one(&self, filter: Document) -> Result<u64>;

    /// Run an aggregation pipeline, stages applied in order.
    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>>;

    /// Create an index if it does not exist; returns the index name.
    async fn create_index(&self, index: &IndexSpec) -> Result<String>;

    /// Names of all indexes on the collection, including `_id_`.
    async fn list_indexes(&self) -> Result<Vec<String>>;

    /// Execution statistics for how `filter` would run.
    async fn explain(&self, filter: Document) -> Result<Document>;

    /// Release the connection. Later calls fail with a connection error.
    async fn close(&self);
}
