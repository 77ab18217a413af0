//! Retry budget for optimistic counter writes.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Configuration for optimistic retries with exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Initial delay between attempts in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between attempts in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 10,
            max_delay_ms: 1_000,
        }
    }
}

impl RetryConfig {
    /// Creates a RetryConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SALON_SEQ_MAX_ATTEMPTS`: Total attempts per allocation (default: 5)
    /// - `SALON_SEQ_RETRY_INITIAL_MS`: Initial backoff delay in ms (default: 10)
    /// - `SALON_SEQ_RETRY_MAX_MS`: Maximum backoff delay in ms (default: 1000)
    ///
    /// Unparsable values and a zero attempt count fall back to the defaults.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_attempts: std::env::var("SALON_SEQ_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(default.max_attempts),
            initial_delay_ms: std::env::var("SALON_SEQ_RETRY_INITIAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.initial_delay_ms),
            max_delay_ms: std::env::var("SALON_SEQ_RETRY_MAX_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_delay_ms),
        }
    }

    /// Creates an exponential backoff builder with jitter.
    /// The first attempt is not a retry, so the builder allows
    /// `max_attempts - 1` retries.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
            .with_jitter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.initial_delay_ms, 10);
        assert_eq!(config.max_delay_ms, 1_000);
    }

    #[test]
    fn test_backoff_config() {
        let config = RetryConfig {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay_ms: 0,
        };
        let _builder = config.backoff();
    }

    // Env vars are process-global, so every from_env case runs in one test.
    #[test]
    fn test_from_env() {
        std::env::remove_var("SALON_SEQ_MAX_ATTEMPTS");
        std::env::remove_var("SALON_SEQ_RETRY_INITIAL_MS");
        std::env::remove_var("SALON_SEQ_RETRY_MAX_MS");
        assert_eq!(RetryConfig::from_env(), RetryConfig::default());

        std::env::set_var("SALON_SEQ_MAX_ATTEMPTS", "8");
        std::env::set_var("SALON_SEQ_RETRY_INITIAL_MS", "20");
        std::env::set_var("SALON_SEQ_RETRY_MAX_MS", "500");
        let config = RetryConfig::from_env();
        assert_eq!(config.max_attempts, 8);
        assert_eq!(config.initial_delay_ms, 20);
        assert_eq!(config.max_delay_ms, 500);

        std::env::set_var("SALON_SEQ_MAX_ATTEMPTS", "0");
        std::env::set_var("SALON_SEQ_RETRY_INITIAL_MS", "soon");
        std::env::set_var("SALON_SEQ_RETRY_MAX_MS", "-1");
        assert_eq!(RetryConfig::from_env(), RetryConfig::default());

        std::env::remove_var("SALON_SEQ_MAX_ATTEMPTS");
        std::env::remove_var("SALON_SEQ_RETRY_INITIAL_MS");
        std::env::remove_var("SALON_SEQ_RETRY_MAX_MS");
    }
}
