//! Configuration loader for humanity-runner

use anyhow::{Context, Result};
use core_logic::{ConfigError, DelayRange};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://testnet.humanity.org";

const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;
const MAX_TIMEOUT_MS: u64 = 10 * 60 * 1000;
const MAX_PACING_MS: u64 = 60 * 60 * 1000;

/// Randomized waits inserted to look like a person using the dashboard.
#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    /// Before every primary request
    #[serde(default = "default_request_pacing")]
    pub request: DelayRange,
    /// After the optional config check
    #[serde(default = "default_config_check_pacing")]
    pub config_check: DelayRange,
    /// Between the daily check and the claim
    #[serde(default = "default_claim_pacing")]
    pub claim: DelayRange,
    /// Between scheduler steps of one account
    #[serde(default = "default_step_pacing")]
    pub step: DelayRange,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            request: default_request_pacing(),
            config_check: default_config_check_pacing(),
            claim: default_claim_pacing(),
            step: default_step_pacing(),
        }
    }
}

fn default_request_pacing() -> DelayRange {
    DelayRange::new(500, 30_000)
}

fn default_config_check_pacing() -> DelayRange {
    DelayRange::new(500, 2_000)
}

fn default_claim_pacing() -> DelayRange {
    DelayRange::new(2_000, 5_000)
}

fn default_step_pacing() -> DelayRange {
    DelayRange::new(1_000, 10_000)
}

/// Configuration for the humanity runner
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Dashboard origin, without trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Account file (proxy|token|cookie per line)
    #[serde(default = "default_accounts_path")]
    pub accounts_path: String,
    /// Pause between two cycles
    #[serde(default = "default_run_interval_secs")]
    pub run_interval_secs: u64,
    #[serde(default = "default_watchdog_interval_secs")]
    pub watchdog_interval_secs: u64,
    /// Idle time outside pacing/countdown that counts as a freeze
    #[serde(default = "default_freeze_threshold_secs")]
    pub freeze_threshold_secs: u64,
    /// Per-attempt timeout, multiplied by the attempt number
    #[serde(default = "default_base_timeout_ms")]
    pub base_timeout_ms: u64,
    #[serde(default = "default_config_check_timeout_ms")]
    pub config_check_timeout_ms: u64,
    /// Chance of renewing a still-present session before an operation
    #[serde(default = "default_session_refresh_probability")]
    pub session_refresh_probability: f64,
    /// Chance of loading the dashboard config before the profile call
    #[serde(default = "default_config_check_probability")]
    pub config_check_probability: f64,
    /// Country assumed when a proxy cannot be located
    #[serde(default = "default_country")]
    pub default_country: String,
    /// MaxMind country database used to locate proxies
    #[serde(default)]
    pub geoip_db_path: Option<String>,
    #[serde(default)]
    pub pacing: PacingConfig,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_accounts_path() -> String {
    core_logic::AccountLoader::ACCOUNT_FILE.to_string()
}

fn default_run_interval_secs() -> u64 {
    6 * 60 * 60
}

fn default_watchdog_interval_secs() -> u64 {
    60
}

fn default_freeze_threshold_secs() -> u64 {
    5 * 60
}

fn default_base_timeout_ms() -> u64 {
    10_000
}

fn default_config_check_timeout_ms() -> u64 {
    5_000
}

fn default_session_refresh_probability() -> f64 {
    0.2
}

fn default_config_check_probability() -> f64 {
    0.3
}

fn default_country() -> String {
    "US".to_string()
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            accounts_path: default_accounts_path(),
            run_interval_secs: default_run_interval_secs(),
            watchdog_interval_secs: default_watchdog_interval_secs(),
            freeze_threshold_secs: default_freeze_threshold_secs(),
            base_timeout_ms: default_base_timeout_ms(),
            config_check_timeout_ms: default_config_check_timeout_ms(),
            session_refresh_probability: default_session_refresh_probability(),
            config_check_probability: default_config_check_probability(),
            default_country: default_country(),
            geoip_db_path: None,
            pacing: PacingConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```ignore
    /// let config = RunnerConfig::from_path("config.toml")?;
    /// ```
    pub fn from_path(path: &str) -> Result<Self> {
        let content =
            fs::read_to_string(path).context(format!("Failed to read config from {}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise falls back to defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("session_refresh_probability", self.session_refresh_probability)?;
        check_probability("config_check_probability", self.config_check_probability)?;

        for (field, value, max) in [
            ("run_interval_secs", self.run_interval_secs, MAX_INTERVAL_SECS),
            ("watchdog_interval_secs", self.watchdog_interval_secs, MAX_INTERVAL_SECS),
            ("freeze_threshold_secs", self.freeze_threshold_secs, MAX_INTERVAL_SECS),
            ("base_timeout_ms", self.base_timeout_ms, MAX_TIMEOUT_MS),
            ("config_check_timeout_ms", self.config_check_timeout_ms, MAX_TIMEOUT_MS),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
            if value > max {
                return Err(invalid(field, &format!("must not exceed {}", max)));
            }
        }

        for (field, range) in [
            ("pacing.request", self.pacing.request),
            ("pacing.config_check", self.pacing.config_check),
            ("pacing.claim", self.pacing.claim),
            ("pacing.step", self.pacing.step),
        ] {
            if !range.is_valid() {
                return Err(invalid(field, "min_ms must not exceed max_ms"));
            }
            if range.max_ms > MAX_PACING_MS {
                return Err(invalid(field, &format!("max_ms must not exceed {}", MAX_PACING_MS)));
            }
        }

        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "base_url".to_string(),
            });
        }
        self.service_url()?;

        Ok(())
    }

    pub fn run_interval(&self) -> Duration {
        Duration::from_secs(self.run_interval_secs)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs)
    }

    pub fn freeze_threshold(&self) -> Duration {
        Duration::from_secs(self.freeze_threshold_secs)
    }

    pub fn base_timeout(&self) -> Duration {
        Duration::from_millis(self.base_timeout_ms)
    }

    pub fn config_check_timeout(&self) -> Duration {
        Duration::from_millis(self.config_check_timeout_ms)
    }

    pub fn service_url(&self) -> Result<ServiceUrl, ConfigError> {
        ServiceUrl::parse(&self.base_url)
    }
}

/// Parsed dashboard origin. Endpoints resolve relative to its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUrl {
    base: Url,
}

impl ServiceUrl {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut base = Url::parse(raw.trim()).map_err(|e| invalid("base_url", &e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid("base_url", "scheme must be http or https"));
        }
        if base.host_str().is_none() {
            return Err(invalid("base_url", "missing host"));
        }

        base.set_query(None);
        base.set_fragment(None);
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }

    /// `path` resolved below the base path; a leading `/` is ignored.
    pub fn endpoint(&self, path: &str) -> Result<String, ConfigError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map(String::from)
            .map_err(|e| invalid("base_url", &format!("cannot resolve {}: {}", path, e)))
    }

    /// `host[:port]`, the port only when it is not the scheme default.
    pub fn authority(&self) -> String {
        let host = self.base.host_str().unwrap_or_default();
        match self.base.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    pub fn origin(&self) -> String {
        self.base.origin().ascii_serialization()
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn check_probability(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, "must be within [0, 1]"))
    }
}
