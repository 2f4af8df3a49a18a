use async_trait::async_trait;
use folio_db::{DocumentStore, IndexSpec};

/// Context provided to modules during initialization
pub struct InitCtx<'a> {
    pub settings: &'a crate::settings::Settings,
    pub store: &'a dyn DocumentStore,
}

/// Core module trait that all folio modules must implement
#[async_trait]
pub trait Module: Sync + Send {
    /// Unique name for this module
    fn name(&self) -> &'static str;

    /// Initialize the module with the provided context
    /// Called during application startup before indexes are provisioned
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Return the indexes this module relies on
    /// They are created in the order returned
    fn indexes(&self) -> Vec<IndexSpec> {
        vec![]
    }

    /// Start background work for this module
    /// Called after indexes are provisioned
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Stop the module and clean up resources
    /// Called during application shutdown
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
