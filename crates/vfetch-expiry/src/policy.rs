//! Expiry policy: how long an uploaded artifact stays available.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Default time an uploaded artifact stays in storage: 20 minutes.
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(20 * 60);

/// Delay between a successful upload and the attempted deletion of the
/// uploaded object.
///
/// Pure configuration: given a schedule time it computes the fire time and
/// nothing else. One policy applies to every upload; the delay is not
/// per-request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    delay: Duration,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_EXPIRY,
        }
    }
}

impl ExpiryPolicy {
    /// Create a policy with an explicit delay.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Read `FILE_EXPIRY_SECS` from the environment, falling back to the
    /// 20-minute default.
    pub fn from_env() -> Self {
        let delay = std::env::var("FILE_EXPIRY_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_EXPIRY);
        Self { delay }
    }

    /// The configured delay before deletion.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Instant a deletion scheduled at `scheduled_at` fires.
    pub fn fire_at(&self, scheduled_at: DateTime<Utc>) -> DateTime<Utc> {
        scheduled_at + chrono::Duration::from_std(self.delay).unwrap_or(chrono::Duration::MAX)
    }

    /// Whole minutes before expiry, as reported to API clients.
    pub fn expires_in_minutes(&self) -> u64 {
        self.delay.as_secs() / 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_twenty_minutes() {
        let policy = ExpiryPolicy::default();
        assert_eq!(policy.delay(), Duration::from_secs(1200));
        assert_eq!(policy.expires_in_minutes(), 20);
    }

    #[test]
    fn test_fire_at_adds_delay() {
        let policy = ExpiryPolicy::new(Duration::from_secs(90));
        let scheduled_at = Utc::now();
        let fire_at = policy.fire_at(scheduled_at);
        assert_eq!(fire_at - scheduled_at, chrono::Duration::seconds(90));
        assert_eq!(policy.expires_in_minutes(), 1);
    }

    #[test]
    fn test_from_env_reads_override_and_falls_back() {
        // Single test covers both branches so the env var is never touched
        // by concurrently running tests.
        std::env::set_var("FILE_EXPIRY_SECS", "300");
        assert_eq!(ExpiryPolicy::from_env().delay(), Duration::from_secs(300));

        std::env::set_var("FILE_EXPIRY_SECS", "not-a-number");
        assert_eq!(ExpiryPolicy::from_env().delay(), DEFAULT_EXPIRY);

        std::env::remove_var("FILE_EXPIRY_SECS");
        assert_eq!(ExpiryPolicy::from_env().delay(), DEFAULT_EXPIRY);
    }
}
