use anyhow::Context;
use std::sync::Arc;

use folio_db::IndexSpec;

use crate::module::{InitCtx, Module};

/// Module registry driving the init, index, start, and stop lifecycle
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new module registry
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Register a module; registration order is initialization order
    pub fn register(&mut self, module: Arc<dyn Module>) {
        self.modules.push(module);
    }

    /// Get all registered modules
    pub fn modules(&self) -> &[Arc<dyn Module>] {
        &self.modules
    }

    /// Get a module by name
    pub fn get_module(&self, name: &str) -> Option<&Arc<dyn Module>> {
        self.modules.iter().find(|module| module.name() == name)
    }

    /// Get the number of registered modules
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Initialize modules in registration order
    pub async fn init_modules(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!("initializing {} modules", self.modules.len());

        for module in &self.modules {
            tracing::info!(module = module.name(), "initializing module");

            module
                .init(ctx)
                .await
                .with_context(|| format!("failed to initialize module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Create every index declared by the registered modules
    ///
    /// Index creation is idempotent, so this runs on every startup.
    pub async fn ensure_indexes(&self, ctx: &InitCtx<'_>) -> anyhow::Result<Vec<String>> {
        let indexes = self.collect_indexes();
        tracing::info!(
            collection = ctx.store.collection_name(),
            "ensuring {} indexes",
            indexes.len()
        );

        let mut names = Vec::with_capacity(indexes.len());
        for (module_name, index) in indexes {
            let name = ctx.store.create_index(&index).await.with_context(|| {
                format!(
                    "failed to create index '{}' for module '{}'",
                    index.name(),
                    module_name
                )
            })?;
            tracing::info!(module = %module_name, index = %name, "index ready");
            names.push(name);
        }

        Ok(names)
    }

    /// Start modules in registration order
    pub async fn start_modules(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!("starting {} modules", self.modules.len());

        for module in &self.modules {
            tracing::info!(module = module.name(), "starting module");

            module
                .start(ctx)
                .await
                .with_context(|| format!("failed to start module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Stop modules in reverse order
    pub async fn stop_modules(&self) -> anyhow::Result<()> {
        tracing::info!("stopping modules in reverse order");

        for module in self.modules.iter().rev() {
            tracing::info!(module = module.name(), "stopping module");

            module
                .stop()
                .await
                .with_context(|| format!("failed to stop module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Collect all indexes from all modules, tagged with the owning module
    pub fn collect_indexes(&self) -> Vec<(String, IndexSpec)> {
        let mut indexes = Vec::new();

        for module in &self.modules {
            for index in module.indexes() {
                indexes.push((module.name().to_string(), index));
            }
        }

        indexes
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
