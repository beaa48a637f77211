//! Sliding-window rate limiter
//!
//! Admits at most `max_requests` per rolling `window`, suspending callers
//! instead of rejecting them. The window is a shared ordered sequence of
//! admission timestamps; a single async mutex guarantees the
//! prune/check/record sequence for one admission is never interleaved with
//! another admission's prune step.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Configuration for the sliding-window rate limiter
#[derive(Debug, Clone)]
pub struct SlidingWindowConfig {
    /// Maximum number of admissions within any rolling window
    pub max_requests: usize,
    /// Length of the rolling window
    pub window: Duration,
}

impl Default for SlidingWindowConfig {
    fn default() -> Self {
        Self { max_requests: 2, window: Duration::from_millis(1000) }
    }
}

impl SlidingWindowConfig {
    /// Create a new configuration builder
    pub fn builder() -> SlidingWindowConfigBuilder {
        SlidingWindowConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_requests == 0 {
            return Err("max_requests must be greater than 0".to_string());
        }
        if self.window.is_zero() {
            return Err("window must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Builder for SlidingWindowConfig
#[derive(Debug)]
pub struct SlidingWindowConfigBuilder {
    config: SlidingWindowConfig,
}

impl Default for SlidingWindowConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SlidingWindowConfigBuilder {
    pub fn new() -> Self {
        Self { config: SlidingWindowConfig::default() }
    }

    pub fn max_requests(mut self, max_requests: usize) -> Self {
        self.config.max_requests = max_requests;
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.config.window = window;
        self
    }

    pub fn build(self) -> Result<SlidingWindowConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Sliding-window rate limiter
///
/// Tracks the timestamp of every admission within the trailing window.
/// `acquire` suspends the caller until one more admission would not exceed
/// the quota; the wait is re-evaluated after each sleep because concurrent
/// admissions can change which entry is oldest.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use quotelink_common::resilience::SlidingWindowLimiter;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = SlidingWindowLimiter::new(2, Duration::from_millis(1000))?;
///
/// limiter.acquire().await; // admitted immediately
/// limiter.acquire().await; // admitted immediately
/// limiter.acquire().await; // suspends until the first admission ages out
/// # Ok(())
/// # }
/// ```
pub struct SlidingWindowLimiter {
    config: SlidingWindowConfig,
    admissions: Arc<Mutex<VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    /// Create a new limiter
    pub fn new(max_requests: usize, window: Duration) -> Result<Self, String> {
        Self::with_config(SlidingWindowConfig { max_requests, window })
    }

    /// Create a new limiter from a validated configuration
    pub fn with_config(config: SlidingWindowConfig) -> Result<Self, String> {
        config.validate()?;
        Ok(Self { config, admissions: Arc::new(Mutex::new(VecDeque::new())) })
    }

    /// Suspend until admitting one more request would not exceed the quota,
    /// then record the admission.
    ///
    /// Never fails; the only bound on the wait is the window length times
    /// the number of callers already queued ahead.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut admissions = self.admissions.lock().await;
                let now = Instant::now();
                Self::prune(&mut admissions, now, self.config.window);

                if admissions.len() < self.config.max_requests {
                    admissions.push_back(now);
                    debug!(count = admissions.len(), "admission recorded");
                    return;
                }

                // Quota full: the oldest entry is fresh (it survived the
                // prune), so the window frees a slot once it ages out.
                let oldest = admissions[0];
                self.config.window.saturating_sub(now.duration_since(oldest))
            };

            debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting for slot");
            tokio::time::sleep(wait).await;
        }
    }

    /// Non-blocking check: would admitting now stay within the quota?
    ///
    /// Does not mutate the window; stale entries are excluded from the
    /// count rather than removed.
    pub async fn can_acquire(&self) -> bool {
        let admissions = self.admissions.lock().await;
        let now = Instant::now();
        let fresh = admissions
            .iter()
            .filter(|ts| now.duration_since(**ts) < self.config.window)
            .count();
        fresh < self.config.max_requests
    }

    /// Number of admissions within the trailing window, pruning stale
    /// entries as a side effect.
    pub async fn current_count(&self) -> usize {
        let mut admissions = self.admissions.lock().await;
        Self::prune(&mut admissions, Instant::now(), self.config.window);
        admissions.len()
    }

    /// Clear all recorded admissions
    pub async fn reset(&self) {
        self.admissions.lock().await.clear();
    }

    /// Get the active configuration
    pub fn config(&self) -> &SlidingWindowConfig {
        &self.config
    }

    fn prune(admissions: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = admissions.front() {
            if now.duration_since(*oldest) >= window {
                admissions.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Clone for SlidingWindowLimiter {
    fn clone(&self) -> Self {
        Self { config: self.config.clone(), admissions: Arc::clone(&self.admissions) }
    }
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_quota_immediately() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_millis(1000)).unwrap();

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.current_count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_third_acquire_waits_for_window() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_millis(1000)).unwrap();

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_window_ever_exceeds_quota() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_millis(1000)).unwrap();

        let admissions: Vec<Instant> = join_all((0..7).map(|_| {
            let limiter = limiter.clone();
            async move {
                limiter.acquire().await;
                Instant::now()
            }
        }))
        .await;

        let mut sorted = admissions;
        sorted.sort();

        // Any admission and the one two places later must be at least a
        // full window apart, otherwise three admissions shared one window.
        for pair in sorted.windows(3) {
            assert!(pair[2].duration_since(pair[0]) >= Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_can_acquire_does_not_mutate() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_millis(1000)).unwrap();

        limiter.acquire().await;
        assert!(limiter.can_acquire().await);
        assert!(limiter.can_acquire().await);
        assert_eq!(limiter.current_count().await, 1);

        limiter.acquire().await;
        assert!(!limiter.can_acquire().await);
        assert_eq!(limiter.current_count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_count_prunes_stale_entries() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_millis(1000)).unwrap();

        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(limiter.current_count().await, 2);

        tokio::time::advance(Duration::from_millis(1001)).await;
        assert_eq!(limiter.current_count().await, 0);
        assert!(limiter.can_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_window() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_millis(1000)).unwrap();

        limiter.acquire().await;
        limiter.acquire().await;
        limiter.reset().await;

        assert_eq!(limiter.current_count().await, 0);

        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_config_validation() {
        assert!(SlidingWindowConfig::builder().max_requests(0).build().is_err());
        assert!(SlidingWindowConfig::builder().window(Duration::ZERO).build().is_err());
        assert!(SlidingWindowConfig::builder()
            .max_requests(5)
            .window(Duration::from_millis(500))
            .build()
            .is_ok());
    }
}
