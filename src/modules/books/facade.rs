use std::sync::Arc;

use bson::Document;
use folio_db::{DbError, DocumentStore, FindSpec, IndexSpec, Result, SortDirection};
use serde::Serialize;

use super::filter::{sort_document, BookFilter, Projection};
use super::models::{Book, BookField, BookUpdate};
use super::pipeline::{Accumulator, GroupKey, GroupRow, Pipeline};

/// Record query facade over the book collection.
///
/// Stateless apart from the shared store handle; clones share the same
/// connection. "Not found" is never an error: absence shows up as an empty
/// result or a zero count.
#[derive(Clone)]
pub struct BookFacade {
    store: Arc<dyn DocumentStore>,
}

/// Average price of the books in one genre.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenreAverage {
    pub genre: Option<String>,
    #[serde(rename = "averagePrice")]
    pub average_price: Option<f64>,
}

/// Number of books written by one author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorCount {
    pub author: Option<String>,
    pub count: u64,
}

/// Number of books published in one decade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecadeCount {
    pub decade: Option<i64>,
    pub count: u64,
}

impl BookFacade {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn find_books(&self, filter: &BookFilter, spec: FindSpec) -> Result<Vec<Book>> {
        let filter = filter.to_document()?;
        let documents = self.store.find(filter, spec).await?;
        Ok(documents.iter().map(Book::from_document).collect())
    }

    /// All books matching `filter`, in store order.
    pub async fn find_by_filter(&self, filter: &BookFilter) -> Result<Vec<Book>> {
        tracing::debug!(module = "books", ?filter, "find_by_filter");
        self.find_books(filter, FindSpec::new()).await
    }

    /// Matching books with only the projected fields populated.
    pub async fn find_by_filter_projected(
        &self,
        filter: &BookFilter,
        projection: &Projection,
    ) -> Result<Vec<Book>> {
        tracing::debug!(module = "books", ?filter, ?projection, "find_by_filter_projected");
        let spec = FindSpec::new().with_projection(projection.to_document()?);
        self.find_books(filter, spec).await
    }

    /// Matching books ordered by `sort_key`; ties keep store order.
    pub async fn find_sorted(
        &self,
        filter: &BookFilter,
        sort_key: BookField,
        direction: SortDirection,
    ) -> Result<Vec<Book>> {
        tracing::debug!(module = "books", ?filter, %sort_key, ?direction, "find_sorted");
        let spec = FindSpec::new().with_sort(sort_document(&[(sort_key, direction)]));
        self.find_books(filter, spec).await
    }

    /// One page of matching books; `page` starts at 1.
    ///
    /// Pages are ordered by identifier so repeated calls see the same split.
    pub async fn find_paginated(
        &self,
        filter: &BookFilter,
        page: u64,
        page_size: u64,
    ) -> Result<Vec<Book>> {
        tracing::debug!(module = "books", ?filter, page, page_size, "find_paginated");
        if page == 0 {
            return Err(DbError::query("page numbers start at 1"));
        }
        if page_size == 0 {
            return Err(DbError::query("page size must be positive"));
        }

        let skip = (page - 1)
            .checked_mul(page_size)
            .ok_or_else(|| DbError::query("page offset overflows"))?;
        let limit = i64::try_from(page_size)
            .map_err(|_| DbError::query(format!("page size {page_size} is too large")))?;

        let spec = FindSpec::new()
            .with_sort(sort_document(&[(BookField::Id, SortDirection::Ascending)]))
            .with_skip(skip)
            .with_limit(limit);
        self.find_books(filter, spec).await
    }

    /// Apply `update` to the first matching book; returns 0 or 1.
    pub async fn update_one(&self, filter: &BookFilter, update: &BookUpdate) -> Result<u64> {
        let filter_doc = filter.to_document()?;
        let update_doc = update.to_update_document()?;

        let matched = self.store.update_one(filter_doc, update_doc).await?;
        tracing::info!(module = "books", ?filter, matched, "update_one");
        Ok(matched)
    }

    /// Delete the first matching book; returns 0 or 1.
    pub async fn delete_one(&self, filter: &BookFilter) -> Result<u64> {
        let deleted = self.store.delete_one(filter.to_document()?).await?;
        tracing::info!(module = "books", ?filter, deleted, "delete_one");
        Ok(deleted)
    }

    /// Run `pipeline` and return one row per output document.
    pub async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<GroupRow>> {
        let stages = pipeline.to_documents()?;
        tracing::debug!(module = "books", stages = stages.len(), "aggregate");

        let rows = self.store.aggregate(stages).await?;
        Ok(rows.into_iter().map(GroupRow::from_document).collect())
    }

    /// Create an index over `keys` unless it already exists; returns its name.
    pub async fn ensure_index(&self, keys: &[(BookField, SortDirection)]) -> Result<String> {
        let index = index_spec(keys)?;
        let name = self.store.create_index(&index).await?;
        tracing::info!(module = "books", index = %name, "ensure_index");
        Ok(name)
    }

    /// Store-reported execution statistics for `filter`. Shape varies by store.
    pub async fn explain(&self, filter: &BookFilter) -> Result<Document> {
        tracing::debug!(module = "books", ?filter, "explain");
        self.store.explain(filter.to_document()?).await
    }

    /// Average price per genre, ordered by genre.
    pub async fn average_price_by_genre(&self) -> Result<Vec<GenreAverage>> {
        let pipeline = Pipeline::new()
            .group(
                GroupKey::Field(BookField::Genre),
                [("averagePrice", Accumulator::Average(BookField::Price))],
            )
            .sort("_id", SortDirection::Ascending);

        Ok(self
            .aggregate(&pipeline)
            .await?
            .into_iter()
            .map(|row| GenreAverage {
                genre: row.key_str().map(str::to_string),
                average_price: row.number("averagePrice"),
            })
            .collect())
    }

    /// Authors with the most books, most prolific first.
    pub async fn top_authors(&self, limit: u64) -> Result<Vec<AuthorCount>> {
        let pipeline = Pipeline::new()
            .group(GroupKey::Field(BookField::Author), [("count", Accumulator::Count)])
            .sort_by([
                ("count", SortDirection::Descending),
                ("_id", SortDirection::Ascending),
            ])
            .limit(limit);

        Ok(self
            .aggregate(&pipeline)
            .await?
            .into_iter()
            .map(|row| AuthorCount {
                author: row.key_str().map(str::to_string),
                count: count_of(&row),
            })
            .collect())
    }

    /// Book counts per publication decade, oldest first.
    pub async fn books_by_decade(&self) -> Result<Vec<DecadeCount>> {
        let pipeline = Pipeline::new()
            .group(
                GroupKey::Bucket {
                    field: BookField::PublishedYear,
                    width: 10,
                },
                [("count", Accumulator::Count)],
            )
            .sort("_id", SortDirection::Ascending);

        Ok(self
            .aggregate(&pipeline)
            .await?
            .into_iter()
            .map(|row| DecadeCount {
                decade: row.key_number().map(|decade| decade as i64),
                count: count_of(&row),
            })
            .collect())
    }
}

fn count_of(row: &GroupRow) -> u64 {
    row.number("count").map_or(0, |count| count.max(0.0) as u64)
}

/// Build an index spec, rejecting empty specs and repeated fields.
pub fn index_spec(keys: &[(BookField, SortDirection)]) -> Result<IndexSpec> {
    if keys.is_empty() {
        return Err(DbError::query("index spec names no fields"));
    }

    let mut spec = IndexSpec::new();
    for (position, (field, direction)) in keys.iter().enumerate() {
        if keys[..position].iter().any(|(seen, _)| seen == field) {
            return Err(DbError::query(format!(
                "field '{field}' appears twice in the index spec"
            )));
        }
        spec = spec.key(field.as_str(), *direction);
    }
    Ok(spec)
}
