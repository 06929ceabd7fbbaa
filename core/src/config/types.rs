use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HubConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    /// When non-empty, only connectors named here are visible.
    #[serde(default)]
    pub action_whitelist: Vec<String>,
}

impl HubConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.execute.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.execute.concurrency must be at least 1".into(),
            ));
        }
        if self.scheduler.extended.concurrency == 0 || self.scheduler.extended.max_workers == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.extended concurrency and max_workers must be at least 1".into(),
            ));
        }
        if self.ingest.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "ingest.batch_size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The HTTP surface refuses to start without a shared secret.
    pub fn validate_for_serve(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.server.secret.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "no shared secret configured (set ACTION_HUB_SECRET)".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Public base URL used to build `url`/`form_url` in connector descriptors.
    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_label")]
    pub label: String,

    /// Shared secret checked against the `Authorization` header.
    #[serde(default)]
    pub secret: String,

    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_label() -> String {
    "Action Hub".to_string()
}

fn default_body_limit_mb() -> usize {
    250
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: String::new(),
            label: default_label(),
            secret: String::new(),
            body_limit_mb: default_body_limit_mb(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "action_hub_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: false,
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// When false every connector runs in-process, which is only meant for
    /// local testing.
    #[serde(default = "default_isolation_enabled")]
    pub isolation_enabled: bool,

    #[serde(default)]
    pub execute: ExecuteQueueConfig,

    #[serde(default)]
    pub extended: ExtendedQueueConfig,
}

fn default_isolation_enabled() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            isolation_enabled: default_isolation_enabled(),
            execute: ExecuteQueueConfig::default(),
            extended: ExtendedQueueConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteQueueConfig {
    #[serde(default = "default_execute_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_execute_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_execute_concurrency() -> usize {
    1
}

fn default_execute_timeout_secs() -> u64 {
    60 * 60
}

impl Default for ExecuteQueueConfig {
    fn default() -> Self {
        Self {
            concurrency: default_execute_concurrency(),
            timeout_secs: default_execute_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendedQueueConfig {
    #[serde(default = "default_extended_concurrency")]
    pub concurrency: usize,

    /// Cap on live extended workers, counted from spawn until the done
    /// sentinel (or kill).
    #[serde(default = "default_extended_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_extended_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_extended_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_extended_concurrency() -> usize {
    1
}

fn default_extended_max_workers() -> usize {
    2
}

fn default_extended_timeout_secs() -> u64 {
    2 * 60 * 60
}

fn default_extended_poll_interval_ms() -> u64 {
    10_000
}

impl Default for ExtendedQueueConfig {
    fn default() -> Self {
        Self {
            concurrency: default_extended_concurrency(),
            max_workers: default_extended_max_workers(),
            timeout_secs: default_extended_timeout_secs(),
            poll_interval_ms: default_extended_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_batch_size() -> usize {
    10_000
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Global switch; when off every failed batch is recorded immediately.
    #[serde(default = "default_retry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_factor")]
    pub factor: u32,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_retryable_status")]
    pub retryable_status: Vec<u16>,
}

fn default_retry_enabled() -> bool {
    true
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_factor() -> u32 {
    3
}

fn default_max_delay_ms() -> u64 {
    5 * 60 * 1000
}

fn default_retryable_status() -> Vec<u16> {
    vec![429, 500, 502, 503, 504]
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_retry_enabled(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            factor: default_factor(),
            max_delay_ms: default_max_delay_ms(),
            retryable_status: default_retryable_status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let cfg = HubConfig::default();
        assert_eq!(cfg.scheduler.execute.concurrency, 1);
        assert_eq!(cfg.scheduler.execute.timeout_secs, 3600);
        assert_eq!(cfg.scheduler.extended.max_workers, 2);
        assert_eq!(cfg.scheduler.extended.timeout_secs, 7200);
        assert!(cfg.scheduler.isolation_enabled);
        assert!(cfg.ingest.retry.enabled);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: HubConfig = toml::from_str(
            r#"
            [scheduler.extended]
            max_workers = 4

            [ingest]
            batch_size = 500
            "#,
        )
        .unwrap();
        assert_eq!(cfg.scheduler.extended.max_workers, 4);
        assert_eq!(cfg.scheduler.extended.concurrency, 1);
        assert_eq!(cfg.ingest.batch_size, 500);
        assert_eq!(cfg.ingest.retry.max_retries, 5);
    }

    #[test]
    fn serve_requires_secret() {
        let mut cfg = HubConfig::default();
        assert!(cfg.validate_for_serve().is_err());
        cfg.server.secret = "s3cret".into();
        assert!(cfg.validate_for_serve().is_ok());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut cfg = HubConfig::default();
        cfg.ingest.batch_size = 0;
        assert!(cfg.validate().is_err());
    }
}
