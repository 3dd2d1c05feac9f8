use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const API_URL_ENV: &str = "ODOOPANEL_API_URL";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PanelConfig {
    pub version: u32,
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub git: GitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PollingConfig {
    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u64,
    #[serde(default = "default_provisioning_interval_ms")]
    pub provisioning_interval_ms: u64,
    #[serde(default = "default_success_grace_ms")]
    pub success_grace_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            log_interval_ms: default_log_interval_ms(),
            provisioning_interval_ms: default_provisioning_interval_ms(),
            success_grace_ms: default_success_grace_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GitConfig {
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            default_branch: default_branch(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_interval_ms() -> u64 {
    2000
}

fn default_provisioning_interval_ms() -> u64 {
    3000
}

fn default_success_grace_ms() -> u64 {
    3000
}

fn default_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not resolve home directory for config path")]
    HomeDirectoryUnavailable,
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {message}")]
    Validation { message: String },
}

pub fn config_dir() -> Result<PathBuf, ConfigError> {
    let base_dirs = BaseDirs::new().ok_or(ConfigError::HomeDirectoryUnavailable)?;
    Ok(base_dirs.home_dir().join(".config").join("odoopanel"))
}

pub fn resolve_config_path() -> anyhow::Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn load_config(path: &Path) -> Result<PanelConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut parsed: PanelConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(base_url) = std::env::var_os(API_URL_ENV) {
        parsed.api.base_url = base_url.to_string_lossy().to_string();
    }

    validate_config(&parsed)?;
    Ok(parsed)
}

pub fn validate_config(config: &PanelConfig) -> Result<(), ConfigError> {
    if config.version != 1 {
        return Err(ConfigError::Validation {
            message: "version must be 1".to_string(),
        });
    }

    let base_url = config.api.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation {
            message: format!("api.base_url must start with http:// or https:// (found '{base_url}')"),
        });
    }

    if config.api.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "api.timeout_secs must be greater than zero".to_string(),
        });
    }

    for (field, value) in [
        ("polling.log_interval_ms", config.polling.log_interval_ms),
        (
            "polling.provisioning_interval_ms",
            config.polling.provisioning_interval_ms,
        ),
    ] {
        if value == 0 {
            return Err(ConfigError::Validation {
                message: format!("{field} must be greater than zero"),
            });
        }
    }

    if config.git.default_branch.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "git.default_branch must be non-empty".to_string(),
        });
    }

    Ok(())
}
