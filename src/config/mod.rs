use std::time::Duration;

use garde::Validate;
use serde::Deserialize;

use crate::services::compress::CompressionSettings;
use crate::services::upload::PollPolicy;

#[derive(Debug, Deserialize, Validate)]
pub struct IngestConfig {
    /// Pantry backend base URL (e.g., "http://localhost:8000")
    #[serde(default = "default_api_base_url")]
    #[garde(length(min = 1))]
    pub api_base_url: String,

    /// User the drafts are written for. The CLI can override it per invocation.
    #[garde(skip)]
    pub user_id: Option<String>,

    /// Delay before the first job status check, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    #[garde(range(min = 1))]
    pub poll_interval_ms: u64,

    /// Growth factor for the poll delay; 1.0 polls at a fixed rate
    #[serde(default = "default_poll_backoff_factor")]
    #[garde(custom(backoff_factor_in_range))]
    pub poll_backoff_factor: f64,

    /// Upper bound for the poll delay, in milliseconds
    #[serde(default = "default_poll_max_interval_ms")]
    #[garde(range(min = 1))]
    pub poll_max_interval_ms: u64,

    /// Give up on a job after this many seconds; 0 waits indefinitely
    #[serde(default = "default_poll_timeout_secs")]
    #[garde(skip)]
    pub poll_timeout_secs: u64,

    /// Longest image edge sent to the analyzer, in pixels
    #[serde(default = "default_image_max_dimension")]
    #[garde(range(min = 1))]
    pub image_max_dimension: u32,

    /// JPEG quality for uploads (1-100)
    #[serde(default = "default_image_quality")]
    #[garde(range(min = 1, max = 100))]
    pub image_quality: u8,

    /// Maximum concurrent create requests during a batch commit
    #[serde(default = "default_commit_concurrency")]
    #[garde(range(min = 1))]
    pub commit_concurrency: usize,

    /// Per-request HTTP timeout, in seconds
    #[serde(default = "default_request_timeout_secs")]
    #[garde(range(min = 1))]
    pub request_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_poll_backoff_factor() -> f64 {
    1.5
}

fn default_poll_max_interval_ms() -> u64 {
    10_000
}

fn default_poll_timeout_secs() -> u64 {
    120
}

fn default_image_max_dimension() -> u32 {
    1200
}

fn default_image_quality() -> u8 {
    70
}

fn default_commit_concurrency() -> usize {
    8
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Finite and within `1.0..=10.0`; NaN fails the range check.
fn backoff_factor_in_range(value: &f64, _ctx: &()) -> garde::Result {
    if !(1.0..=10.0).contains(value) {
        return Err(garde::Error::new("must be between 1.0 and 10.0"));
    }
    Ok(())
}

impl IngestConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Deserialize and validate from `(NAME, value)` pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::from_iter(vars)?;
        config.validate()?;
        Ok(config)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            backoff_factor: self.poll_backoff_factor,
            max_interval: Duration::from_millis(self.poll_max_interval_ms.max(self.poll_interval_ms)),
            max_wait: (self.poll_timeout_secs > 0).then(|| Duration::from_secs(self.poll_timeout_secs)),
        }
    }

    pub fn compression(&self) -> CompressionSettings {
        CompressionSettings {
            max_width: self.image_max_dimension,
            max_height: self.image_max_dimension,
            quality: self.image_quality,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] garde::Report),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<IngestConfig, ConfigError> {
        IngestConfig::from_vars(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    fn from_pairs(pairs: &[(&str, &str)]) -> IngestConfig {
        load(pairs).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert!(config.user_id.is_none());
        assert_eq!(config.poll_policy(), PollPolicy::default());
        assert_eq!(config.compression(), CompressionSettings::default());
        assert_eq!(config.commit_concurrency, 8);
    }

    #[test]
    fn test_zero_timeout_means_unbounded() {
        let config = from_pairs(&[("POLL_TIMEOUT_SECS", "0"), ("POLL_BACKOFF_FACTOR", "1.0")]);
        let policy = config.poll_policy();
        assert!(policy.max_wait.is_none());
        assert_eq!(policy.next_delay(policy.interval), Duration::from_millis(2000));
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("API_BASE_URL", "https://pantry.example.com"),
            ("USER_ID", "user-42"),
            ("IMAGE_MAX_DIMENSION", "800"),
        ]);
        assert_eq!(config.api_base_url, "https://pantry.example.com");
        assert_eq!(config.user_id.as_deref(), Some("user-42"));
        assert_eq!(config.compression().max_width, 800);
    }

    #[test]
    fn test_unusable_poll_settings_rejected() {
        for pairs in [
            [("POLL_BACKOFF_FACTOR", "NaN")],
            [("POLL_BACKOFF_FACTOR", "1e20")],
            [("POLL_BACKOFF_FACTOR", "0.5")],
            [("POLL_INTERVAL_MS", "0")],
        ] {
            let err = load(&pairs).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{pairs:?}");
        }
    }

    #[test]
    fn test_bad_number_is_env_error() {
        assert!(matches!(load(&[("COMMIT_CONCURRENCY", "many")]), Err(ConfigError::Env(_))));
        assert!(matches!(load(&[("COMMIT_CONCURRENCY", "0")]), Err(ConfigError::Invalid(_))));
    }
}
