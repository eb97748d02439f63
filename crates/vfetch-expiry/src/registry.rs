//! Keyed registry of one-shot deletion timers.
//!
//! Each scheduled deletion is a sleeping Tokio task plus a map entry. The
//! map entry is the single source of truth for whether a job is still
//! pending: the timer task must *claim* (remove) its entry under the map
//! lock before it may run its action, and every cancellation path removes
//! entries under the same lock, so cancel/fire races resolve
//! deterministically to whichever side locked first.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::key::ArtifactKey;
use crate::observer::{ExpiryObserver, NoopObserver};

/// Description of a scheduled deletion, returned by
/// [`TimerRegistry::schedule`].
#[derive(Debug, Clone)]
pub struct JobHandle {
    key: ArtifactKey,
    job_id: u64,
    scheduled_at: DateTime<Utc>,
    fire_at: DateTime<Utc>,
}

impl JobHandle {
    /// Key the job was scheduled under.
    pub fn key(&self) -> &ArtifactKey {
        &self.key
    }

    /// Registry-unique id of this particular scheduling. A later schedule
    /// call for the same key produces a new id.
    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    /// When the job was scheduled.
    pub fn scheduled_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    /// When the job's action is due to run.
    pub fn fire_at(&self) -> DateTime<Utc> {
        self.fire_at
    }
}

/// A pending deletion owned by the registry. Immutable once inserted; it
/// leaves the map by firing or by cancellation, never by mutation.
struct ScheduledJob {
    job_id: u64,
    scheduled_at: DateTime<Utc>,
    fire_at: DateTime<Utc>,
    timer: JoinHandle<()>,
}

struct RegistryInner {
    jobs: Mutex<HashMap<ArtifactKey, ScheduledJob>>,
    next_job_id: AtomicU64,
    observer: Arc<dyn ExpiryObserver>,
}

/// In-memory registry of pending deletions, keyed by artifact.
///
/// Invariant: a key is present in the map iff a deletion for it has been
/// scheduled and has neither fired nor been cancelled; at most one pending
/// job per key. Scheduling over a pending key replaces it silently (the
/// superseded action never runs).
///
/// Purely in-memory: pending jobs do not survive a restart. Dropping the
/// registry aborts all outstanding timers, so a test can use a fresh
/// registry without leaking timers into the next one.
pub struct TimerRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerRegistry {
    /// Create a registry that reports outcomes only through logs.
    pub fn new() -> Self {
        Self::with_observer(Arc::new(NoopObserver))
    }

    /// Create a registry that additionally reports every event to
    /// `observer`.
    pub fn with_observer(observer: Arc<dyn ExpiryObserver>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                jobs: Mutex::new(HashMap::new()),
                next_job_id: AtomicU64::new(1),
                observer,
            }),
        }
    }

    /// Register `action` to run once, `delay` after now.
    ///
    /// If a job is already pending for `key` it is superseded: its timer is
    /// aborted and its action will never run. Must be called from within a
    /// Tokio runtime.
    pub fn schedule<F, Fut>(&self, key: impl Into<ArtifactKey>, delay: Duration, action: F) -> JobHandle
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let key = key.into();
        let scheduled_at = Utc::now();
        let fire_at =
            scheduled_at + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
        let job_id = self.inner.next_job_id.fetch_add(1, Ordering::Relaxed);

        // Spawn and insert under one lock acquisition. The timer task also
        // needs the lock to claim its entry, so even a zero-delay task
        // cannot observe the map before its own entry is in place.
        let previous = {
            let mut jobs = self.inner.jobs.lock().expect("expiry registry lock poisoned");

            let timer = tokio::spawn({
                let inner = Arc::clone(&self.inner);
                let key = key.clone();
                async move {
                    tokio::time::sleep(delay).await;
                    RegistryInner::fire(inner, key, job_id, action).await;
                }
            });

            jobs.insert(
                key.clone(),
                ScheduledJob {
                    job_id,
                    scheduled_at,
                    fire_at,
                    timer,
                },
            )
        };

        if let Some(superseded) = previous {
            superseded.timer.abort();
            debug!(
                key = %key,
                superseded_job_id = superseded.job_id,
                "Replaced pending deletion with a new schedule"
            );
            self.inner.observer.job_superseded(&key);
        }

        debug!(key = %key, job_id, fire_at = %fire_at, "Scheduled deletion");
        self.inner.observer.job_scheduled(&key, fire_at);

        JobHandle {
            key,
            job_id,
            scheduled_at,
            fire_at,
        }
    }

    /// Cancel the pending job for `key` so its action never runs.
    ///
    /// Returns whether a pending job was found. Idempotent: cancelling an
    /// absent key is a no-op returning `false`, as is cancelling a job
    /// whose fire path has already claimed its entry.
    pub fn cancel_one(&self, key: &ArtifactKey) -> bool {
        let removed = {
            let mut jobs = self.inner.jobs.lock().expect("expiry registry lock poisoned");
            jobs.remove(key)
        };

        match removed {
            Some(job) => {
                job.timer.abort();
                info!(key = %key, job_id = job.job_id, "Cancelled pending deletion");
                self.inner.observer.job_cancelled(key);
                true
            }
            None => {
                debug!(key = %key, "No pending deletion to cancel");
                false
            }
        }
    }

    /// Cancel every pending job, returning how many were pending.
    ///
    /// Safe to call while schedules and fires are in flight: jobs are
    /// drained under the map lock first, so a timer that wakes concurrently
    /// finds its entry gone and does not run its action.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<(ArtifactKey, ScheduledJob)> = {
            let mut jobs = self.inner.jobs.lock().expect("expiry registry lock poisoned");
            jobs.drain().collect()
        };

        for (key, job) in &drained {
            job.timer.abort();
            debug!(key = %key, job_id = job.job_id, "Cancelled pending deletion");
        }

        let count = drained.len();
        if count > 0 {
            info!(count, "Cancelled all pending deletions");
        }
        self.inner.observer.jobs_cancelled(count);
        count
    }

    /// Number of pending jobs.
    pub fn pending(&self) -> usize {
        self.inner.jobs.lock().expect("expiry registry lock poisoned").len()
    }

    /// Whether a job is pending for `key`.
    pub fn contains(&self, key: &ArtifactKey) -> bool {
        self.inner
            .jobs
            .lock()
            .expect("expiry registry lock poisoned")
            .contains_key(key)
    }

    /// Handle for the job currently pending on `key`, if any.
    pub fn pending_job(&self, key: &ArtifactKey) -> Option<JobHandle> {
        let jobs = self.inner.jobs.lock().expect("expiry registry lock poisoned");
        jobs.get(key).map(|job| JobHandle {
            key: key.clone(),
            job_id: job.job_id,
            scheduled_at: job.scheduled_at,
            fire_at: job.fire_at,
        })
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        let count = self.cancel_all();
        if count > 0 {
            debug!(count, "Registry dropped with pending deletions; timers aborted");
        }
    }
}

impl RegistryInner {
    /// Fire path, run by the timer task once its delay has elapsed.
    async fn fire<F, Fut>(inner: Arc<RegistryInner>, key: ArtifactKey, job_id: u64, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        // Claim the entry. Removal is atomic with respect to cancellation:
        // a cancel that locked first already emptied the slot and we skip;
        // a cancel that arrives after this point finds nothing and no-ops.
        // An id mismatch means a newer schedule superseded this task.
        let claimed = {
            let mut jobs = inner.jobs.lock().expect("expiry registry lock poisoned");
            match jobs.get(&key) {
                Some(job) if job.job_id == job_id => jobs.remove(&key),
                _ => None,
            }
        };

        if claimed.is_none() {
            debug!(key = %key, job_id, "Deletion job no longer current; skipping");
            return;
        }

        debug!(key = %key, job_id, "Expiry delay elapsed; deleting artifact");
        let outcome = action().await;
        match &outcome {
            Ok(()) => info!(key = %key, "Deleted expired artifact"),
            // Best-effort cleanup: the failure is logged and reported, the
            // key stays removed, and the delete is not retried.
            Err(e) => error!(key = %key, error = %e, "Failed to delete expired artifact"),
        }
        inner.observer.job_fired(&key, &outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Counts observer callbacks so tests can assert on outcomes without
    /// scraping logs.
    #[derive(Default)]
    struct CountingObserver {
        scheduled: AtomicUsize,
        superseded: AtomicUsize,
        fired_ok: AtomicUsize,
        fired_err: AtomicUsize,
        cancelled: AtomicUsize,
        bulk_cancelled: AtomicUsize,
    }

    impl ExpiryObserver for CountingObserver {
        fn job_scheduled(&self, _key: &ArtifactKey, _fire_at: DateTime<Utc>) {
            self.scheduled.fetch_add(1, Ordering::SeqCst);
        }

        fn job_superseded(&self, _key: &ArtifactKey) {
            self.superseded.fetch_add(1, Ordering::SeqCst);
        }

        fn job_fired(&self, _key: &ArtifactKey, outcome: &anyhow::Result<()>) {
            match outcome {
                Ok(()) => self.fired_ok.fetch_add(1, Ordering::SeqCst),
                Err(_) => self.fired_err.fetch_add(1, Ordering::SeqCst),
            };
        }

        fn job_cancelled(&self, _key: &ArtifactKey) {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }

        fn jobs_cancelled(&self, count: usize) {
            self.bulk_cancelled.fetch_add(count, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_fire_prevents_action() {
        let registry = TimerRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        registry.schedule("a", Duration::from_millis(10), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(registry.cancel_one(&ArtifactKey::from("a")));
        // Second cancel is a no-op.
        assert!(!registry.cancel_one(&ArtifactKey::from("a")));

        tokio::time::sleep(Duration::from_millis(15)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(registry.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_action_runs_exactly_once_after_delay() {
        let registry = TimerRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        let handle = registry.schedule("b", Duration::from_millis(10), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(handle.fire_at() - handle.scheduled_at(), chrono::Duration::milliseconds(10));
        assert!(registry.contains(&ArtifactKey::from("b")));

        // Never fires early.
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(registry.pending(), 0);

        // And never fires again.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_fires_after_insert() {
        let registry = TimerRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        registry.schedule("now", Duration::ZERO, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(registry.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_action_is_logged_and_job_removed() {
        let observer = Arc::new(CountingObserver::default());
        let registry = TimerRegistry::with_observer(Arc::clone(&observer) as Arc<dyn ExpiryObserver>);

        registry.schedule("doomed", Duration::from_millis(10), || async {
            anyhow::bail!("storage offline")
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(registry.pending(), 0);
        assert!(!registry.cancel_one(&ArtifactKey::from("doomed")));
        assert_eq!(observer.fired_err.load(Ordering::SeqCst), 1);
        assert_eq!(observer.fired_ok.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_cancels_everything_pending() {
        let observer = Arc::new(CountingObserver::default());
        let registry = TimerRegistry::with_observer(Arc::clone(&observer) as Arc<dyn ExpiryObserver>);
        let fired = Arc::new(AtomicUsize::new(0));

        for key in ["x", "y", "z"] {
            let counter = Arc::clone(&fired);
            registry.schedule(key, Duration::from_millis(10), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        assert_eq!(registry.pending(), 3);

        assert_eq!(registry.cancel_all(), 3);
        assert_eq!(registry.pending(), 0);
        assert_eq!(observer.bulk_cancelled.load(Ordering::SeqCst), 3);
        for key in ["x", "y", "z"] {
            assert!(!registry.cancel_one(&ArtifactKey::from(key)));
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        // A fresh cancel_all with nothing pending reports zero.
        assert_eq!(registry.cancel_all(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_supersedes_pending_job() {
        let observer = Arc::new(CountingObserver::default());
        let registry = TimerRegistry::with_observer(Arc::clone(&observer) as Arc<dyn ExpiryObserver>);
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        registry.schedule("k", Duration::from_millis(50), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let counter = Arc::clone(&second);
        let replacement = registry.schedule("k", Duration::from_millis(10), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        // Exactly one live job for the key, and it is the replacement.
        assert_eq!(registry.pending(), 1);
        let live = registry.pending_job(&ArtifactKey::from("k")).unwrap();
        assert_eq!(live.job_id(), replacement.job_id());
        assert_eq!(live.fire_at(), replacement.fire_at());
        assert_eq!(observer.superseded.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(registry.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_pending_timers() {
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let registry = TimerRegistry::new();
            let counter = Arc::clone(&fired);
            registry.schedule("leak", Duration::from_millis(10), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_each_event_once() {
        let observer = Arc::new(CountingObserver::default());
        let registry = TimerRegistry::with_observer(Arc::clone(&observer) as Arc<dyn ExpiryObserver>);

        registry.schedule("fires", Duration::from_millis(5), || async { Ok(()) });
        registry.schedule("cancelled", Duration::from_millis(50), || async { Ok(()) });
        tokio::time::sleep(Duration::from_millis(10)).await;
        registry.cancel_one(&ArtifactKey::from("cancelled"));

        assert_eq!(observer.scheduled.load(Ordering::SeqCst), 2);
        assert_eq!(observer.fired_ok.load(Ordering::SeqCst), 1);
        assert_eq!(observer.cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(observer.superseded.load(Ordering::SeqCst), 0);
    }
}
