//! Error types for geocoding operations, with retry strategies.
//!
//! # Error Handling Philosophy
//!
//! Errors should be:
//! 1. **Actionable**: Tell the caller what to do, not just what went wrong
//! 2. **Specific**: Include relevant context (provider id, HTTP status, etc.)
//! 3. **Recoverable**: Distinguish transient errors (retry) from permanent ones
//!
//! A provider error never escapes a `resolve` call: the engine recovers it
//! into an empty partial result for that provider and keeps merging the
//! others. The taxonomy below exists so that the *adapter* layer can decide
//! whether a failed fetch is worth retrying before it gives up.
//!
//! # Retry Strategies
//!
//! - `ExponentialBackoff`: for transient network/server errors
//! - `WaitAndRetry`: for upstream rate limiting (wait the specified duration)
//! - `NoRetry`: for permanent errors (bad configuration, invalid request)

use std::time::Duration;
use thiserror::Error;

/// Result type for geocoding operations.
pub type Result<T> = std::result::Result<T, GeocodeError>;

// ============================================================================
// Retry Strategy
// ============================================================================

/// Strategy for retrying failed provider fetches.
///
/// Each error type maps to an appropriate retry strategy based on
/// whether the error is transient (retry) or permanent (no retry).
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry with exponential backoff (for transient errors).
    ExponentialBackoff {
        /// Initial delay before first retry.
        base_delay: Duration,
        /// Maximum delay between retries.
        max_delay: Duration,
        /// Maximum number of retry attempts.
        max_attempts: u32,
    },

    /// Wait for a specific duration then retry once (for upstream rate limits).
    WaitAndRetry {
        /// Duration to wait before retrying.
        wait: Duration,
    },

    /// Do not retry at all (permanent error).
    NoRetry,
}

impl RetryStrategy {
    /// Standard exponential backoff for network errors.
    pub fn network_backoff() -> Self {
        Self::ExponentialBackoff {
            base_delay: Duration::from_millis(125),
            max_delay: Duration::from_secs(5),
            max_attempts: 3,
        }
    }

    /// Standard exponential backoff for upstream server errors.
    pub fn server_backoff() -> Self {
        Self::ExponentialBackoff {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            max_attempts: 2,
        }
    }

    /// Check if this strategy allows retrying.
    pub fn should_retry(&self) -> bool {
        !matches!(self, Self::NoRetry)
    }
}

// ============================================================================
// Geocode Error Types
// ============================================================================

/// Errors that can occur when talking to a geocoding backend.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// API error from the provider (non-success HTTP status).
    #[error("API error: {0}")]
    ApiError(String),

    /// Upstream rate limit exceeded (HTTP 429).
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Network error (connection failure, DNS, TLS).
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out")]
    Timeout,

    /// Malformed payload from the provider.
    #[error("Malformed response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    /// Invalid engine or provider configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Provider-specific error that fits no other variant.
    #[error("Provider error: {0}")]
    ProviderError(String),
}

impl From<reqwest::Error> for GeocodeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GeocodeError::Timeout
        } else if err.is_connect() {
            GeocodeError::NetworkError(format!("Connection failed: {}", err))
        } else {
            GeocodeError::NetworkError(err.to_string())
        }
    }
}

// ============================================================================
// Retry Strategy Methods
// ============================================================================

impl GeocodeError {
    /// Get the appropriate retry strategy for this error.
    ///
    /// # Returns
    ///
    /// - `ExponentialBackoff` for transient network/server errors
    /// - `WaitAndRetry` for upstream rate limiting
    /// - `NoRetry` for permanent errors (configuration, malformed payload)
    pub fn retry_strategy(&self) -> RetryStrategy {
        match self {
            // Transient transport errors, retry aggressively.
            Self::NetworkError(_) | Self::Timeout => RetryStrategy::network_backoff(),

            // Upstream told us to slow down.
            Self::RateLimited(_) => RetryStrategy::WaitAndRetry {
                wait: Duration::from_secs(2),
            },

            // Upstream server errors, retry moderately.
            Self::ApiError(msg)
                if msg.contains("500") || msg.contains("502") || msg.contains("503") =>
            {
                RetryStrategy::server_backoff()
            }

            // A payload that failed to parse will fail to parse again.
            Self::ApiError(_)
            | Self::MalformedResponse(_)
            | Self::ConfigError(_)
            | Self::ProviderError(_) => RetryStrategy::NoRetry,
        }
    }

    /// Check if this error is recoverable (can be retried).
    pub fn is_recoverable(&self) -> bool {
        self.retry_strategy().should_retry()
    }
}
