//! Mapper configuration.

use std::time::Duration;

/// Configuration shared by a session's mapper, resolver and
/// big-collection handles.
#[derive(Debug, Clone)]
pub struct MapperConfig {
    /// Namespace used when neither an override nor the type names one.
    pub default_namespace: Option<String>,

    /// Entries per remote call when bulk-appending to a big list.
    pub list_chunk_size: usize,

    /// Entries per remote call when bulk-putting into a big map.
    pub map_chunk_size: usize,

    /// Number of independently locked change-cache shards.
    pub cache_shards: usize,

    /// Bind the JSON codec to types no other codec accepts.
    pub json_fallback: bool,

    /// Collision retry policy for big-collection writes.
    pub retry: RetryConfig,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            default_namespace: None,
            list_chunk_size: 100,
            map_chunk_size: 50,
            cache_shards: 16,
            json_fallback: false,
            retry: RetryConfig::default(),
        }
    }
}

impl MapperConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the process-wide default namespace.
    #[must_use]
    pub fn default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = Some(namespace.into());
        self
    }

    /// Sets the big-list bulk append chunk size (at least 1).
    #[must_use]
    pub fn list_chunk_size(mut self, size: usize) -> Self {
        self.list_chunk_size = size.max(1);
        self
    }

    /// Sets the big-map bulk put chunk size (at least 1).
    #[must_use]
    pub fn map_chunk_size(mut self, size: usize) -> Self {
        self.map_chunk_size = size.max(1);
        self
    }

    /// Sets the number of change-cache shards (at least 1).
    #[must_use]
    pub fn cache_shards(mut self, shards: usize) -> Self {
        self.cache_shards = shards.max(1);
        self
    }

    /// Enables or disables the JSON fallback codec.
    #[must_use]
    pub const fn json_fallback(mut self, value: bool) -> Self {
        self.json_fallback = value;
        self
    }

    /// Sets the collision retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Retry policy for duplicate-index collisions.
///
/// Only the duplicate-index signal is retried. The default makes ten
/// attempts with no delay between them; the next attempt recomputes the
/// index, which is what resolves the race.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on any delay.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Creates a configuration with `max_attempts` and no delay.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::ZERO,
            max_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates the delay after a failed attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.initial_delay.is_zero() {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let delay_secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(10)
    }
}
