//! Apply tunables read from the environment.

use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ConfigError, PushError, Result};
use crate::remote::RetryPolicy;

/// Staging deadline in minutes.
pub const STAGING_TIMEOUT_ENV: &str = "CF_STAGING_TIMEOUT";

/// Startup deadline in minutes.
pub const STARTUP_TIMEOUT_ENV: &str = "CF_STARTUP_TIMEOUT";

/// Poll interval in milliseconds.
pub const POLL_INTERVAL_ENV: &str = "CFPUSH_POLL_INTERVAL_MS";

/// Attempt ceiling for retried reads.
pub const RETRY_ATTEMPTS_ENV: &str = "CFPUSH_RETRY_ATTEMPTS";

const DEFAULT_STAGING_TIMEOUT_MINS: u64 = 15;
const DEFAULT_STARTUP_TIMEOUT_MINS: u64 = 5;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

const MAX_TIMEOUT_MINS: u64 = 24 * 60;
const MAX_POLL_INTERVAL_MS: u64 = 60 * 60 * 1_000;
const MAX_RETRY_ATTEMPTS: u64 = 100;

/// Timing and retry settings for the apply phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplySettings {
    /// Pause between job polls.
    pub poll_interval: Duration,
    /// Deadline for bits processing and staging jobs.
    pub staging_timeout: Duration,
    /// Deadline for instances to start.
    pub startup_timeout: Duration,
    /// Retry policy for reads and polls.
    pub retry: RetryPolicy,
}

impl Default for ApplySettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            staging_timeout: Duration::from_secs(DEFAULT_STAGING_TIMEOUT_MINS * 60),
            startup_timeout: Duration::from_secs(DEFAULT_STARTUP_TIMEOUT_MINS * 60),
            retry: RetryPolicy::default(),
        }
    }
}

impl ApplySettings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is not a positive integer or exceeds
    /// its cap (one day for timeouts, one hour for the poll interval).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through the given variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is not a positive integer or exceeds
    /// its cap (one day for timeouts, one hour for the poll interval).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(mins) = read_positive(&lookup, STAGING_TIMEOUT_ENV, MAX_TIMEOUT_MINS)? {
            settings.staging_timeout = Duration::from_secs(mins * 60);
        }
        if let Some(mins) = read_positive(&lookup, STARTUP_TIMEOUT_ENV, MAX_TIMEOUT_MINS)? {
            settings.startup_timeout = Duration::from_secs(mins * 60);
        }
        if let Some(ms) = read_positive(&lookup, POLL_INTERVAL_ENV, MAX_POLL_INTERVAL_MS)? {
            settings.poll_interval = Duration::from_millis(ms);
        }
        if let Some(attempts) = read_positive(&lookup, RETRY_ATTEMPTS_ENV, MAX_RETRY_ATTEMPTS)? {
            settings.retry.max_attempts = u32::try_from(attempts).unwrap_or(u32::MAX);
        }

        debug!("Apply settings: {settings:?}");
        Ok(settings)
    }
}

/// Reads a positive integer no larger than `max`.
fn read_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    max: u64,
) -> Result<Option<u64>> {
    let Some(value) = lookup(name) else {
        return Ok(None);
    };
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 && n <= max => Ok(Some(n)),
        _ => Err(PushError::Config(ConfigError::InvalidEnvVar {
            name: name.to_string(),
            value,
        })),
    }
}

/// Loads a `.env` file from the given directory if present.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be loaded.
pub fn load_dotenv(dir: impl AsRef<Path>) -> Result<()> {
    let env_path = dir.as_ref().join(".env");

    if env_path.exists() {
        info!("Loading environment from: {}", env_path.display());
        dotenvy::from_path(&env_path)
            .map_err(|e| PushError::Config(ConfigError::parse(".env", e.to_string())))?;
    } else {
        debug!(".env file not found at: {}", env_path.display());
    }

    Ok(())
}
