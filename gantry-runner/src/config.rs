//! Engine configuration
//!
//! Every delay and ceiling of the monitoring loop is a configuration
//! value, never derived from job size; the configuration object is passed
//! explicitly into the dispatcher so concurrent runs stay independent.

use std::time::Duration;

/// Default benign-diagnostic predicate
///
/// Some scheduler stacks answer a status poll of a finished job with
/// "code 24: ... job finished but resource usage information ... could not
/// be provided" instead of a status. That report is not a failure.
pub fn code24_diagnostic(message: &str) -> bool {
    message.starts_with("code 24")
}

/// Engine configuration
///
/// All timeouts and ceilings are configurable to allow tuning for
/// different clusters (slow controllers, strict poll-rate limits).
#[derive(Debug, Clone)]
pub struct Config {
    /// Delay between submission and the first status poll; newly
    /// submitted jobs are not immediately queryable on some schedulers
    pub startup_delay: Duration,

    /// Delay between status polls
    pub poll_interval: Duration,

    /// Cooldown after a scheduler communication failure before the status
    /// poll is retried
    pub status_retry_delay: Duration,

    /// Ceiling on status-poll attempts within one submission attempt
    /// (counted, not elapsed time)
    pub max_status_attempts: u32,

    /// How many times to re-check for output files before giving up
    pub output_read_retries: u32,

    /// Delay between output-file existence checks
    pub output_read_delay: Duration,

    /// Predicate deciding which scheduler diagnostics are benign and may
    /// be ignored by the monitoring loop
    pub benign_diagnostic: fn(&str) -> bool,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Recognized variables (all optional, durations in seconds):
    /// - GANTRY_STARTUP_DELAY (default: 5)
    /// - GANTRY_POLL_INTERVAL (default: 5)
    /// - GANTRY_STATUS_RETRY_DELAY (default: 60)
    /// - GANTRY_MAX_STATUS_ATTEMPTS (default: 5)
    /// - GANTRY_OUTPUT_READ_RETRIES (default: 5)
    /// - GANTRY_OUTPUT_READ_DELAY (default: 2)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            startup_delay: env_secs("GANTRY_STARTUP_DELAY", defaults.startup_delay),
            poll_interval: env_secs("GANTRY_POLL_INTERVAL", defaults.poll_interval),
            status_retry_delay: env_secs("GANTRY_STATUS_RETRY_DELAY", defaults.status_retry_delay),
            max_status_attempts: env_count(
                "GANTRY_MAX_STATUS_ATTEMPTS",
                defaults.max_status_attempts,
            ),
            output_read_retries: env_count(
                "GANTRY_OUTPUT_READ_RETRIES",
                defaults.output_read_retries,
            ),
            output_read_delay: env_secs("GANTRY_OUTPUT_READ_DELAY", defaults.output_read_delay),
            benign_diagnostic: defaults.benign_diagnostic,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_status_attempts == 0 {
            anyhow::bail!("max_status_attempts must be greater than 0");
        }

        if self.output_read_retries == 0 {
            anyhow::bail!("output_read_retries must be greater than 0");
        }

        Ok(())
    }

    /// Configuration with no delays, for exercising the loop in tests
    #[cfg(test)]
    pub(crate) fn immediate() -> Self {
        Self {
            startup_delay: Duration::ZERO,
            poll_interval: Duration::ZERO,
            status_retry_delay: Duration::ZERO,
            output_read_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_secs(5),
            poll_interval: Duration::from_secs(5),
            status_retry_delay: Duration::from_secs(60),
            max_status_attempts: 5,
            output_read_retries: 5,
            output_read_delay: Duration::from_secs(2),
            benign_diagnostic: code24_diagnostic,
        }
    }
}

fn env_secs(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_count(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(default)
}
