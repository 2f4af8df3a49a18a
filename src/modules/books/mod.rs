pub mod facade;
pub mod filter;
pub mod models;
pub mod pipeline;
pub mod tour;

use async_trait::async_trait;
use folio_db::{IndexSpec, SortDirection};
use folio_kernel::{InitCtx, Module};

pub use facade::{AuthorCount, BookFacade, DecadeCount, GenreAverage};
pub use filter::{BookFilter, Comparison, Projection};
pub use models::{Book, BookField, BookUpdate, FieldValue};
pub use pipeline::{Accumulator, GroupKey, GroupRow, Pipeline};

/// Indexes the book queries rely on: title lookups, and author listings
/// newest first.
pub fn index_keys() -> Vec<Vec<(BookField, SortDirection)>> {
    vec![
        vec![(BookField::Title, SortDirection::Ascending)],
        vec![
            (BookField::Author, SortDirection::Ascending),
            (BookField::PublishedYear, SortDirection::Descending),
        ],
    ]
}

/// Books module: owns the book collection's indexes and lifecycle logging
pub struct BooksModule;

impl BooksModule {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for BooksModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            collection = ctx.store.collection_name(),
            "books module initialized"
        );
        Ok(())
    }

    fn indexes(&self) -> Vec<IndexSpec> {
        index_keys()
            .iter()
            .filter_map(|keys| facade::index_spec(keys).ok())
            .collect()
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create a new instance of the books module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(BooksModule::new())
}
