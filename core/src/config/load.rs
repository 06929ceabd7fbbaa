use std::path::{Path, PathBuf};

use super::types::HubConfig;
use crate::error::ConfigError;

/// Get the default data directory: ~/.action-hub
pub fn get_hub_data_dir() -> Result<PathBuf, ConfigError> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| ConfigError::NoHome)?;
    Ok(PathBuf::from(home).join(".action-hub"))
}

pub fn load_from_path(path: &Path) -> Result<HubConfig, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str::<HubConfig>(&s).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

pub fn load_default() -> Result<HubConfig, ConfigError> {
    // Priority 1: ~/.action-hub/config.toml
    let hub_config = get_hub_data_dir().ok().map(|d| d.join("config.toml"));

    // Priority 2: ./config.toml
    let local_config = Path::new("config.toml");

    let mut cfg = match hub_config.as_deref().filter(|p| p.exists()) {
        Some(p) => load_from_path(p)?,
        None if local_config.exists() => load_from_path(local_config)?,
        None => HubConfig::default(),
    };

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    cfg.validate()?;
    Ok(cfg)
}

/// Environment variable overrides (highest priority). `lookup` is injected so
/// tests do not have to mutate the process environment.
pub fn apply_env_overrides<F>(cfg: &mut HubConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("ACTION_HUB_SECRET") {
        cfg.server.secret = v;
    }
    if let Some(v) = get("ACTION_HUB_BASE_URL") {
        cfg.server.base_url = v.trim_end_matches('/').to_string();
    }
    if let Some(v) = get("ACTION_HUB_LABEL") {
        cfg.server.label = v;
    }
    if let Some(v) = get("PORT") {
        cfg.server.port = parse_env("PORT", &v)?;
    }
    if get("ACTION_HUB_DEBUG").is_some() {
        cfg.logging.level = "debug".to_string();
    }
    if let Some(v) = get("ACTION_HUB_EXECUTE_CONCURRENCY") {
        cfg.scheduler.execute.concurrency = parse_env("ACTION_HUB_EXECUTE_CONCURRENCY", &v)?;
    }
    if let Some(v) = get("ACTION_HUB_EXTENDED_CONCURRENCY") {
        cfg.scheduler.extended.concurrency = parse_env("ACTION_HUB_EXTENDED_CONCURRENCY", &v)?;
    }
    if let Some(v) = get("ACTION_HUB_EXTENDED_MAX_WORKERS") {
        cfg.scheduler.extended.max_workers = parse_env("ACTION_HUB_EXTENDED_MAX_WORKERS", &v)?;
    }
    if let Some(v) = get("ACTION_HUB_DISABLE_ISOLATION") {
        cfg.scheduler.isolation_enabled = !parse_flag(&v);
    }
    if let Some(v) = get("ACTION_HUB_BATCH_RETRY") {
        cfg.ingest.retry.enabled = parse_flag(&v);
    }
    if let Some(v) = get("ACTION_WHITELIST") {
        cfg.action_whitelist = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidEnv {
            key,
            value: value.to_string(),
        })
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
