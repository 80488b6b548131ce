//! # Client Configuration
//!
//! Cluster endpoints, credentials, pool sizing, socket timeouts, and the
//! retry policy applied by the dispatcher.

use std::time::Duration;

/// Configuration for a [`Cluster`](crate::Cluster) and its session pool.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Seed node addresses, e.g. "127.0.0.1:11210". Sessions are opened
    /// round-robin across them.
    pub endpoints: Vec<String>,
    /// Username presented during the SASL handshake. Empty skips auth.
    pub username: String,
    /// Password presented during the SASL handshake.
    pub password: String,
    /// Bucket the session binds to after authentication.
    pub bucket: String,
    /// Client name announced in the `Hello` frame.
    pub client_name: String,
    /// Maximum idle sessions kept in the pool.
    pub max_idle: usize,
    /// Maximum total sessions (idle + in-use).
    pub max_total: usize,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Optional socket read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional socket write timeout.
    pub write_timeout: Option<Duration>,
    /// Retry policy for retryable failures.
    pub retry: RetryPolicy,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            endpoints: vec!["127.0.0.1:11210".to_string()],
            username: String::new(),
            password: String::new(),
            bucket: "default".to_string(),
            client_name: concat!("davenport/", env!("CARGO_PKG_VERSION")).to_string(),
            max_idle: 8,
            max_total: 16,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Exponential backoff retry policy.
///
/// Attempt `n` (zero-based) sleeps `base_delay * 2^n` before re-sending,
/// capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (>= 1).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Disables retries entirely.
    pub const fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Returns the backoff delay after the given zero-based failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        // Shift saturates well before Duration overflow matters.
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}
