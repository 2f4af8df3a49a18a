//! In-process document store.
//!
//! Implements the subset of MongoDB query semantics the folio facade emits,
//! so the facade can be exercised without a running deployment. Documents
//! keep insertion order, which is the "natural" order reported by `find`.

mod eval;
mod pipeline;

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Document};
use tokio::sync::RwLock;

use crate::error::{DbError, Result};
use crate::options::{id_index_keys, FindSpec, IndexSpec};
use crate::store::DocumentStore;

const ID_INDEX_NAME: &str = "_id_";

#[derive(Default)]
struct State {
    documents: Vec<Document>,
    indexes: Vec<(String, Document)>,
}

pub struct MemoryStore {
    collection_name: String,
    state: RwLock<State>,
    reachable: AtomicBool,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Create an empty collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self::with_documents(collection, Vec::new())
    }

    /// Create a collection seeded with `documents`.
    ///
    /// Documents without an `_id` are assigned a fresh ObjectId.
    pub fn with_documents(collection: impl Into<String>, documents: Vec<Document>) -> Self {
        let documents = documents.into_iter().map(with_object_id).collect();

        Self {
            collection_name: collection.into(),
            state: RwLock::new(State {
                documents,
                indexes: Vec::new(),
            }),
            reachable: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        }
    }

    /// Simulate losing (or regaining) the connection to the store.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Release);
    }

    /// Snapshot of every stored document in natural order.
    pub async fn documents(&self) -> Vec<Document> {
        self.state.read().await.documents.clone()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DbError::connection("store connection has been closed"));
        }
        if !self.reachable.load(Ordering::Acquire) {
            return Err(DbError::connection(format!(
                "collection '{}' is unreachable",
                self.collection_name
            )));
        }
        Ok(())
    }
}

fn with_object_id(document: Document) -> Document {
    if document.contains_key("_id") {
        return document;
    }
    let mut with_id = doc! { "_id": ObjectId::new() };
    for (key, value) in document {
        with_id.insert(key, value);
    }
    with_id
}

fn matching(documents: &[Document], filter: &Document) -> Result<Vec<Document>> {
    let mut found = Vec::new();
    for doc in documents {
        if eval::matches(doc, filter)? {
            found.push(doc.clone());
        }
    }
    Ok(found)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn collection_name(&self) -> &str {
        &self.collection_name
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_available()
    }

    async fn find(&self, filter: Document, spec: FindSpec) -> Result<Vec<Document>> {
        self.ensure_available()?;
        tracing::debug!(target: "folio-db", %filter, ?spec, "memory find");

        let state = self.state.read().await;
        let mut found = matching(&state.documents, &filter)?;

        if let Some(sort) = &spec.sort {
            eval::sort_documents(&mut found, sort)?;
        }
        if let Some(skip) = spec.skip {
            let skip = usize::try_from(skip).unwrap_or(usize::MAX);
            found = found.into_iter().skip(skip).collect();
        }
        if let Some(limit) = spec.limit.filter(|limit| *limit != 0) {
            let limit = usize::try_from(limit.unsigned_abs()).unwrap_or(usize::MAX);
            found.truncate(limit);
        }
        if let Some(projection) = &spec.projection {
            found = found
                .iter()
                .map(|doc| eval::project(doc, projection))
                .collect::<Result<Vec<_>>>()?;
        }

        Ok(found)
    }

    async fn update_one(&self, filter: Document, update: Document) -> Result<u64> {
        self.ensure_available()?;
        tracing::debug!(target: "folio-db", %filter, %update, "memory update_one");

        let mut state = self.state.write().await;
        let mut target = None;
        for (position, doc) in state.documents.iter().enumerate() {
            if eval::matches(doc, &filter)? {
                target = Some(position);
                break;
            }
        }

        match target {
            Some(position) => {
                eval::apply_update(&mut state.documents[position], &update)?;
                Ok(1)
            }
            None => {
                // Malformed updates fail even when nothing matches.
                eval::apply_update(&mut Document::new(), &update)?;
                Ok(0)
            }
        }
    }

    async fn delete_one(&self, filter: Document) -> Result<u64> {
        self.ensure_available()?;
        tracing::debug!(target: "folio-db", %filter, "memory delete_one");

        let mut state = self.state.write().await;
        let mut target = None;
        for (position, doc) in state.documents.iter().enumerate() {
            if eval::matches(doc, &filter)? {
                target = Some(position);
                break;
            }
        }

        Ok(match target {
            Some(position) => {
                state.documents.remove(position);
                1
            }
            None => 0,
        })
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        self.ensure_available()?;
        tracing::debug!(target: "folio-db", stages = pipeline.len(), "memory aggregate");

        let documents = self.state.read().await.documents.clone();
        pipeline::run(documents, &pipeline)
    }

    async fn create_index(&self, index: &IndexSpec) -> Result<String> {
        self.ensure_available()?;
        if index.is_empty() {
            return Err(DbError::query("index spec names no fields"));
        }

        let name = index.name();
        let keys = index.keys_document();
        let mut state = self.state.write().await;

        for (existing_name, existing_keys) in &state.indexes {
            match (existing_name == &name, existing_keys == &keys) {
                (true, true) => return Ok(name),
                (true, false) => {
                    return Err(DbError::query(format!(
                        "an index named '{name}' already exists with different keys"
                    )));
                }
                (false, true) => {
                    return Err(DbError::query(format!(
                        "index with keys {keys} already exists as '{existing_name}'"
                    )));
                }
                (false, false) => {}
            }
        }

        state.indexes.push((name.clone(), keys));
        Ok(name)
    }

    async fn list_indexes(&self) -> Result<Vec<String>> {
        self.ensure_available()?;

        let state = self.state.read().await;
        let mut names = vec![ID_INDEX_NAME.to_string()];
        names.extend(state.indexes.iter().map(|(name, _)| name.clone()));
        Ok(names)
    }

    async fn explain(&self, filter: Document) -> Result<Document> {
        self.ensure_available()?;

        let state = self.state.read().await;
        let returned = matching(&state.documents, &filter)?.len() as i64;
        let total = state.documents.len() as i64;

        let candidate = std::iter::once((ID_INDEX_NAME, id_index_keys()))
            .chain(state.indexes.iter().map(|(n, k)| (n.as_str(), k.clone())))
            .find(|(_, keys)| {
                keys.keys()
                    .next()
                    .is_some_and(|leading| filter.contains_key(leading))
            });

        let (stage, keys_examined, docs_examined) = match &candidate {
            Some((name, _)) => (doc! { "stage": "IXSCAN", "indexName": *name }, returned, returned),
            None => (doc! { "stage": "COLLSCAN" }, 0, total),
        };

        Ok(doc! {
            "executionSuccess": true,
            "nReturned": returned,
            "executionTimeMillis": 0_i64,
            "totalKeysExamined": keys_examined,
            "totalDocsExamined": docs_examined,
            "executionStages": stage,
        })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
