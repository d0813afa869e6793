//! Sender configuration
//!
//! Plain structs with builder setters; environment parsing lives with the
//! binary. `validate()` enforces the positive, bounded ranges the relay
//! depends on before anything is spawned.

use core_config::ConfigError;

/// Shape of one batch's retry sequence: exponentially growing waits, capped
/// per attempt, bounded attempt count.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per batch (first try included).
    pub max_attempts: u32,

    /// First backoff wait in milliseconds.
    pub base_delay_ms: u64,

    /// Multiplier applied to the wait after each retry (typically 2.0).
    pub backoff_factor: f64,

    /// Ceiling on a single backoff wait in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 7,
            base_delay_ms: 50,
            backoff_factor: 2.0,
            max_delay_ms: 5000,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts < 1 {
            return Err(out_of_range("max_attempts", "must be at least 1"));
        }
        if self.base_delay_ms < 1 {
            return Err(out_of_range("base_delay_ms", "must be at least 1"));
        }
        if self.backoff_factor <= 1.0 {
            return Err(out_of_range("backoff_factor", "must be greater than 1.0"));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(out_of_range(
                "max_delay_ms",
                "must be at least the base delay",
            ));
        }
        Ok(())
    }
}

/// Configuration for the buffered sender.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Buffer capacity, and the ceiling on entries per drain cycle.
    pub buffer_length: usize,

    /// Sleep between drain cycles while the buffer is empty.
    pub idle_wait_ms: u64,

    /// Bound on the worker join wait during shutdown.
    pub stop_timeout_ms: u64,

    /// Backoff shape for transient sink failures.
    pub retry: RetryPolicy,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            buffer_length: 10,
            idle_wait_ms: 50,
            stop_timeout_ms: 10_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl SenderConfig {
    /// Set the buffer capacity / batch ceiling.
    pub fn with_buffer_length(mut self, length: usize) -> Self {
        self.buffer_length = length;
        self
    }

    /// Set the idle sleep between empty drain cycles.
    pub fn with_idle_wait_ms(mut self, wait: u64) -> Self {
        self.idle_wait_ms = wait;
        self
    }

    /// Set the shutdown join bound.
    pub fn with_stop_timeout_ms(mut self, timeout: u64) -> Self {
        self.stop_timeout_ms = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_length < 1 {
            return Err(out_of_range("buffer_length", "must be at least 1"));
        }
        if self.idle_wait_ms < 1 {
            return Err(out_of_range("idle_wait_ms", "must be at least 1"));
        }
        self.retry.validate()
    }
}

fn out_of_range(key: &str, details: &str) -> ConfigError {
    ConfigError::OutOfRange {
        key: key.to_string(),
        details: details.to_string(),
    }
}
