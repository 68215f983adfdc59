use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Reconnect backoff configuration
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub exponential_backoff: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            exponential_backoff: true,
        }
    }
}

/// Tracks camera reconnect attempts while the feed is lost.
///
/// There is no retry limit: the feed keeps trying for as long as the
/// application runs, only spacing attempts out up to `max_delay`.
#[derive(Debug)]
pub struct CameraRecovery {
    config: RecoveryConfig,
    attempts: u32,
    next_attempt: Option<Instant>,
}

impl CameraRecovery {
    pub fn new() -> Self {
        Self::with_config(RecoveryConfig::default())
    }

    pub fn with_config(config: RecoveryConfig) -> Self {
        Self {
            config,
            attempts: 0,
            next_attempt: None,
        }
    }

    /// Whether a reconnect attempt is due at `now`
    pub fn should_attempt(&self, now: Instant) -> bool {
        match self.next_attempt {
            Some(at) => now >= at,
            None => true,
        }
    }

    /// Record a failed reconnect and schedule the next one
    pub fn record_failure(&mut self, now: Instant) -> Duration {
        let delay = self.calculate_delay(self.attempts);
        self.attempts = self.attempts.saturating_add(1);
        self.next_attempt = Some(now + delay);
        debug!(
            "Camera reconnect attempt {} failed, next attempt in {:?}",
            self.attempts, delay
        );
        delay
    }

    /// Reset after the camera is back
    pub fn reset(&mut self) {
        if self.attempts > 0 {
            info!("Camera recovered after {} reconnect attempts", self.attempts);
        }
        self.attempts = 0;
        self.next_attempt = None;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Calculate delay for retry with exponential backoff
    fn calculate_delay(&self, retry_count: u32) -> Duration {
        if !self.config.exponential_backoff {
            return self.config.base_delay.min(self.config.max_delay);
        }

        let factor = 2u32.saturating_pow(retry_count.min(16));
        self.config
            .base_delay
            .saturating_mul(factor)
            .min(self.config.max_delay)
    }
}

impl Default for CameraRecovery {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_capped() {
        let mut recovery = CameraRecovery::new();
        let now = Instant::now();

        assert_eq!(recovery.record_failure(now), Duration::from_millis(100));
        assert_eq!(recovery.record_failure(now), Duration::from_millis(200));
        assert_eq!(recovery.record_failure(now), Duration::from_millis(400));
        assert_eq!(recovery.record_failure(now), Duration::from_millis(800));
        assert_eq!(recovery.record_failure(now), Duration::from_secs(1));
        for _ in 0..40 {
            assert!(recovery.record_failure(now) <= Duration::from_secs(1));
        }
    }

    #[test]
    fn test_attempt_scheduling() {
        let mut recovery = CameraRecovery::new();
        let now = Instant::now();
        assert!(recovery.should_attempt(now));

        let delay = recovery.record_failure(now);
        assert!(!recovery.should_attempt(now));
        assert!(recovery.should_attempt(now + delay));

        recovery.reset();
        assert_eq!(recovery.attempts(), 0);
        assert!(recovery.should_attempt(now));
    }

    #[test]
    fn test_linear_backoff() {
        let mut recovery = CameraRecovery::with_config(RecoveryConfig {
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(1),
            exponential_backoff: false,
        });
        let now = Instant::now();
        assert_eq!(recovery.record_failure(now), Duration::from_millis(250));
        assert_eq!(recovery.record_failure(now), Duration::from_millis(250));
    }
}
