//! Application state.

use std::sync::Arc;

use async_trait::async_trait;
use vfetch_expiry::{ExpiryPolicy, LifecycleCoordinator, ObjectDeleter, TimerRegistry};
use vfetch_storage::StorageClient;

use crate::config::ApiConfig;
use crate::metrics::ExpiryMetrics;

/// Adapts the storage client to the deleter seam the expiry core expects.
pub struct StorageDeleter {
    storage: Arc<StorageClient>,
}

impl StorageDeleter {
    pub fn new(storage: Arc<StorageClient>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ObjectDeleter for StorageDeleter {
    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.storage.delete_object(key).await?;
        Ok(())
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub storage: Arc<StorageClient>,
    pub lifecycle: Arc<LifecycleCoordinator>,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let storage = Arc::new(StorageClient::from_env().await?);

        let registry = TimerRegistry::with_observer(Arc::new(ExpiryMetrics));
        let deleter = Arc::new(StorageDeleter::new(Arc::clone(&storage)));
        let lifecycle = LifecycleCoordinator::new(registry, ExpiryPolicy::from_env(), deleter);

        Ok(Self {
            config,
            storage,
            lifecycle: Arc::new(lifecycle),
        })
    }
}
