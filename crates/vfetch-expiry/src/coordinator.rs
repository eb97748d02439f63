//! Ties the timer registry to storage: schedules a deletion whenever an
//! artifact finishes uploading, and tears the schedule down on shutdown or
//! operator request.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::key::ArtifactKey;
use crate::policy::ExpiryPolicy;
use crate::registry::{JobHandle, TimerRegistry};

/// Deletes a stored object by key. Implemented over the storage client so
/// the lifecycle layer never holds an S3 handle itself.
#[async_trait]
pub trait ObjectDeleter: Send + Sync + 'static {
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}

/// Owns the expiry schedule for uploaded artifacts.
///
/// Every successful upload gets exactly one pending deletion, due after the
/// policy delay. Deletion is best effort: a failed delete is logged and not
/// retried, and the artifact is then left to the bucket's own lifecycle
/// rules.
pub struct LifecycleCoordinator {
    registry: TimerRegistry,
    policy: ExpiryPolicy,
    deleter: Arc<dyn ObjectDeleter>,
}

impl LifecycleCoordinator {
    pub fn new(registry: TimerRegistry, policy: ExpiryPolicy, deleter: Arc<dyn ObjectDeleter>) -> Self {
        Self {
            registry,
            policy,
            deleter,
        }
    }

    /// Schedule the freshly uploaded artifact to be deleted after the
    /// policy delay. A repeat upload under the same key restarts its clock.
    pub fn on_upload_succeeded(&self, key: impl Into<ArtifactKey>) -> JobHandle {
        let key = key.into();
        let deleter = Arc::clone(&self.deleter);
        let object = key.clone();

        let handle = self.registry.schedule(key.clone(), self.policy.delay(), move || async move {
            deleter.delete(object.as_str()).await
        });

        info!(
            key = %key,
            fire_at = %handle.fire_at(),
            expires_in_minutes = self.policy.expires_in_minutes(),
            "Scheduled uploaded artifact for expiry"
        );
        handle
    }

    /// Cancel every pending deletion ahead of process exit. Artifacts
    /// already in storage are left for the bucket's lifecycle rules.
    pub fn on_shutdown(&self) -> usize {
        let cancelled = self.registry.cancel_all();
        info!(cancelled, "Shutdown requested; cleared deletion schedule");
        cancelled
    }

    /// Operator asked to clear the schedule without stopping the service.
    pub fn on_cleanup_requested(&self) -> usize {
        let cancelled = self.registry.cancel_all();
        info!(cancelled, "Cleanup requested; cleared deletion schedule");
        cancelled
    }

    /// Number of artifacts currently awaiting deletion.
    pub fn pending_jobs(&self) -> usize {
        self.registry.pending()
    }

    pub fn policy(&self) -> ExpiryPolicy {
        self.policy
    }

    pub fn registry(&self) -> &TimerRegistry {
        &self.registry
    }
}
