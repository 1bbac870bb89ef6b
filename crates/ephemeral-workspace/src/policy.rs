//! Retention policy for artifacts tracked by the registry.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time-to-live for artifacts.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(10 * 60);

/// Upper bound for a derived sweep interval.
pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// How long artifacts live and how often they are swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// How long an artifact is kept after registration
    pub retention: Duration,
    /// Explicit sweep interval; `None` derives one from `retention`
    pub sweep_interval: Option<Duration>,
}

impl RetentionPolicy {
    /// Create a policy with the default ten minute TTL and a derived interval.
    pub fn new() -> Self {
        Self {
            retention: DEFAULT_RETENTION,
            sweep_interval: None,
        }
    }

    /// Set the time-to-live.
    #[must_use]
    pub fn remove_after(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Pin the sweep interval instead of deriving it.
    #[must_use]
    pub fn sweep_every(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// The interval the sweeper should actually run at.
    pub fn effective_sweep_interval(&self) -> Duration {
        self.sweep_interval
            .unwrap_or_else(|| self.recommended_sweep_interval())
    }

    /// Sweep interval derived from the retention duration.
    ///
    /// One minute, or the retention itself when that is shorter (never below one second).
    pub fn recommended_sweep_interval(&self) -> Duration {
        self.retention.clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL)
    }

    /// True once an artifact of the given age is past its TTL.
    ///
    /// An artifact exactly `retention` old is still live.
    pub fn is_expired(&self, age: Duration) -> bool {
        age > self.retention
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommended_interval_is_capped_at_one_minute() {
        let default = RetentionPolicy::new();
        assert_eq!(default.recommended_sweep_interval(), Duration::from_secs(60));

        let two_hours = RetentionPolicy::new().remove_after(Duration::from_secs(2 * 60 * 60));
        assert_eq!(two_hours.recommended_sweep_interval(), Duration::from_secs(60));

        let three_days = RetentionPolicy::new().remove_after(Duration::from_secs(3 * 24 * 60 * 60));
        assert_eq!(three_days.effective_sweep_interval(), MAX_SWEEP_INTERVAL);

        let short = RetentionPolicy::new().remove_after(Duration::from_secs(20));
        assert_eq!(short.recommended_sweep_interval(), Duration::from_secs(20));

        let tiny = RetentionPolicy::new().remove_after(Duration::from_millis(100));
        assert_eq!(tiny.recommended_sweep_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_explicit_interval_wins() {
        let policy = RetentionPolicy::new().sweep_every(Duration::from_secs(5));
        assert_eq!(policy.effective_sweep_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let policy = RetentionPolicy::new().remove_after(Duration::from_secs(60));
        assert!(!policy.is_expired(Duration::from_secs(59)));
        assert!(!policy.is_expired(Duration::from_secs(60)));
        assert!(policy.is_expired(Duration::from_millis(60_001)));
    }
}
