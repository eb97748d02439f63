//! Observer seam for registry events.
//!
//! The registry logs every outcome itself; the observer exists so callers
//! can consume outcomes programmatically (metrics counters in the API
//! server, counting doubles in tests) instead of scraping logs.

use chrono::{DateTime, Utc};

use crate::key::ArtifactKey;

/// Receives registry events. All methods default to no-ops so implementers
/// override only what they care about.
///
/// Called from the request path (`job_scheduled`, `job_cancelled`,
/// `jobs_cancelled`) and from timer tasks (`job_fired`); implementations
/// must not block.
pub trait ExpiryObserver: Send + Sync + 'static {
    /// A deletion was scheduled for `key`, due at `fire_at`.
    fn job_scheduled(&self, _key: &ArtifactKey, _fire_at: DateTime<Utc>) {}

    /// A newer schedule call replaced the pending job for `key`; the
    /// superseded action will never run.
    fn job_superseded(&self, _key: &ArtifactKey) {}

    /// The job for `key` fired and its action finished with `outcome`.
    /// The key has already been removed from the registry either way.
    fn job_fired(&self, _key: &ArtifactKey, _outcome: &anyhow::Result<()>) {}

    /// A single pending job was cancelled before firing.
    fn job_cancelled(&self, _key: &ArtifactKey) {}

    /// A bulk cancellation removed `count` pending jobs.
    fn jobs_cancelled(&self, _count: usize) {}
}

/// Observer that ignores every event; the default for
/// [`TimerRegistry::new`](crate::registry::TimerRegistry::new).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ExpiryObserver for NoopObserver {}
