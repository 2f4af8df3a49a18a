//! Application bootstrap: connect once, run the module lifecycle, tear down once.

use std::sync::Arc;

use anyhow::Context;
use folio_db::{DocumentStore, MongoConfig, MongoStore};
use folio_kernel::settings::Settings;
use folio_kernel::{InitCtx, ModuleRegistry};

use crate::modules::books::BookFacade;

/// A running application: the shared store, its modules, and the book facade.
pub struct App {
    store: Arc<dyn DocumentStore>,
    registry: ModuleRegistry,
    books: BookFacade,
}

impl App {
    /// Connect to the configured MongoDB deployment and start all modules.
    pub async fn connect(settings: Settings) -> anyhow::Result<Self> {
        let config = MongoConfig {
            uri: settings.database.uri.clone(),
            database: settings.database.name.clone(),
            collection: settings.database.collection.clone(),
            server_selection_timeout: settings.database.server_selection_timeout(),
            app_name: Some(settings.database.app_name.clone()),
        };

        let store = MongoStore::connect(&config)
            .await
            .with_context(|| format!("failed to connect to database '{}'", config.database))?;

        Self::start(settings, Arc::new(store)).await
    }

    /// Start all modules against an already connected store.
    pub async fn start(settings: Settings, store: Arc<dyn DocumentStore>) -> anyhow::Result<Self> {
        let mut registry = ModuleRegistry::new();
        crate::modules::register_all(&mut registry);

        let ctx = InitCtx {
            settings: &settings,
            store: store.as_ref(),
        };
        registry.init_modules(&ctx).await?;
        registry.ensure_indexes(&ctx).await?;
        registry.start_modules(&ctx).await?;

        tracing::info!(
            env = ?settings.environment,
            collection = store.collection_name(),
            modules = registry.module_count(),
            "folio started"
        );

        let books = BookFacade::new(store.clone());
        Ok(Self {
            store,
            registry,
            books,
        })
    }

    pub fn books(&self) -> &BookFacade {
        &self.books
    }

    /// Stop modules in reverse order, then release the connection.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let stopped = self.registry.stop_modules().await;
        self.store.close().await;
        tracing::info!("folio stopped");
        stopped
    }
}
