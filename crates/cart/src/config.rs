//! Cart client configuration.
//!
//! # Environment Variables
//!
//! All optional:
//! - `GROCER_API_URL` - Storefront base URL (default: `http://127.0.0.1:3000`)
//! - `GROCER_SESSION_COOKIE` - Session cookie sent with authenticated calls
//! - `GROCER_SYNC_DEBOUNCE_MS` - Quiet period before an automatic sync (default: 3000)
//! - `GROCER_SYNC_MAX_RETRIES` - Retries before the engine reports an error (default: 5)
//! - `GROCER_CART_RETENTION_DAYS` - Age after which a persisted cart is discarded (default: 7)

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Default quiet period after the last mutation before a sync is pushed.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(3);

/// Default age after which a persisted cart is considered stale.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * SECS_PER_DAY);

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Storage key the cart record is written under.
pub const DEFAULT_STORAGE_KEY: &str = "grocer.cart";

const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Capped exponential backoff for failed syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Transient failures tolerated before the status becomes `Error`.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `initial * 2^(attempt-1)`, capped.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Cart client configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Storefront base URL the cart endpoints hang off.
    pub api_url: Url,
    /// Cookie header value carrying an authenticated session, if any.
    pub session_cookie: Option<SecretString>,
    /// Quiet period after the last mutation before an automatic sync.
    pub debounce: Duration,
    /// Backoff used after transient failures.
    pub retry: RetryPolicy,
    /// Persisted carts older than this are discarded on load.
    pub retention: Duration,
    /// Key the persisted record is stored under.
    pub storage_key: String,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            session_cookie: None,
            debounce: DEFAULT_DEBOUNCE,
            retry: RetryPolicy::default(),
            retention: DEFAULT_RETENTION,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

impl CartConfig {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Some(raw) = get_optional_env("GROCER_API_URL") {
            config.api_url = Url::parse(&raw).map_err(|e| {
                ConfigError::InvalidEnvVar("GROCER_API_URL".to_string(), e.to_string())
            })?;
        }
        config.session_cookie = get_optional_env("GROCER_SESSION_COOKIE").map(SecretString::from);
        if let Some(ms) = parse_optional_env::<u64>("GROCER_SYNC_DEBOUNCE_MS")? {
            config.debounce = Duration::from_millis(ms);
        }
        if let Some(retries) = parse_optional_env::<u32>("GROCER_SYNC_MAX_RETRIES")? {
            config.retry.max_retries = retries;
        }
        if let Some(days) = parse_optional_env::<u64>("GROCER_CART_RETENTION_DAYS")? {
            config.retention = retention_from_days(days)?;
        }

        Ok(config)
    }

    /// Set the debounce window.
    #[must_use]
    pub const fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the storefront base URL.
    #[must_use]
    pub fn with_api_url(mut self, api_url: Url) -> Self {
        self.api_url = api_url;
        self
    }
}

#[allow(clippy::expect_used)]
fn default_api_url() -> Url {
    Url::parse(DEFAULT_API_URL).expect("default API URL is a valid URL")
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Convert `GROCER_CART_RETENTION_DAYS` to a duration.
fn retention_from_days(days: u64) -> Result<Duration, ConfigError> {
    days.checked_mul(SECS_PER_DAY)
        .map(Duration::from_secs)
        .ok_or_else(|| {
            ConfigError::InvalidEnvVar(
                "GROCER_CART_RETENTION_DAYS".to_string(),
                format!("{days} days is out of range"),
            )
        })
}

/// Parse an optional environment variable.
fn parse_optional_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
        .transpose()
}
