use std::time::Duration;

/// Timing knobs for the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileConfig {
    /// Budget for retrying a Create or Read (including Update's version
    /// read) through transient failures.
    pub create_read_timeout: Duration,
    /// First backoff between retried attempts; doubles per attempt.
    pub retry_initial_backoff: Duration,
    pub retry_max_backoff: Duration,
    pub delete: DeletePollConfig,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            create_read_timeout: Duration::from_secs(10 * 60),
            retry_initial_backoff: Duration::from_secs(1),
            retry_max_backoff: Duration::from_secs(10),
            delete: DeletePollConfig::default(),
        }
    }
}

/// How long and how often a confirmed delete polls for absence.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletePollConfig {
    pub timeout: Duration,
    /// Wait before the first GET.
    pub delay: Duration,
    pub min_interval: Duration,
    pub max_interval: Duration,
    /// Consecutive 404s needed to conclude the entity is gone.
    pub continuous_target: u32,
}

impl Default for DeletePollConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20 * 60),
            delay: Duration::from_secs(1),
            min_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(1),
            continuous_target: 2,
        }
    }
}

impl ReconcileConfig {
    /// Millisecond-scale timings for tests against an in-process server.
    pub fn fast() -> Self {
        Self {
            create_read_timeout: Duration::from_millis(500),
            retry_initial_backoff: Duration::from_millis(1),
            retry_max_backoff: Duration::from_millis(5),
            delete: DeletePollConfig {
                timeout: Duration::from_millis(500),
                delay: Duration::from_millis(1),
                min_interval: Duration::from_millis(1),
                max_interval: Duration::from_millis(2),
                continuous_target: 2,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_provider_timings() {
        let c = ReconcileConfig::default();
        assert_eq!(c.create_read_timeout, Duration::from_secs(600));
        assert_eq!(c.delete.timeout, Duration::from_secs(1200));
        assert_eq!(c.delete.delay, Duration::from_secs(1));
        assert_eq!(c.delete.min_interval, Duration::from_millis(500));
        assert_eq!(c.delete.continuous_target, 2);
    }

    #[test]
    fn fast_config_keeps_the_two_404_rule() {
        assert_eq!(ReconcileConfig::fast().delete.continuous_target, 2);
    }
}
