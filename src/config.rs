use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::MdexError;

pub const DEFAULT_CONFIG_FILE: &str = "mdex-dl.json";
pub const DEFAULT_API_BASE: &str = "https://api.mangadex.org";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub engine: Option<EngineSection>,
    #[serde(default)]
    pub api: Option<ApiSection>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EngineSection {
    #[serde(default)]
    pub page_budget: Option<u64>,
    #[serde(default)]
    pub stall_timeout_secs: Option<u64>,
    #[serde(default)]
    pub launch_delay_ms: Option<u64>,
    #[serde(default)]
    pub delay_threshold: Option<usize>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ApiSection {
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub page_budget: u64,
    pub stall_timeout: Duration,
    pub launch_delay: Duration,
    pub delay_threshold: usize,
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_budget: 200,
            stall_timeout: Duration::from_secs(30),
            launch_delay: Duration::from_millis(1500),
            delay_threshold: 40,
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub engine: EngineConfig,
    pub api: ApiConfig,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, MdexError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::discover(),
        };

        let Some(config_path) = config_path else {
            return Self::resolve_config(Config::default());
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| MdexError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| MdexError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, MdexError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let defaults = EngineConfig::default();
        let section = config.engine.unwrap_or_default();

        let engine = EngineConfig {
            page_budget: section.page_budget.unwrap_or(defaults.page_budget),
            stall_timeout: section
                .stall_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.stall_timeout),
            launch_delay: section
                .launch_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.launch_delay),
            delay_threshold: section.delay_threshold.unwrap_or(defaults.delay_threshold),
            request_timeout: section
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        };

        if engine.page_budget == 0 {
            return Err(MdexError::Config(
                "engine.page_budget must be greater than zero".to_string(),
            ));
        }
        if engine.stall_timeout.is_zero() {
            return Err(MdexError::Config(
                "engine.stall_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if engine.request_timeout.is_zero() {
            return Err(MdexError::Config(
                "engine.request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        let base_url = config
            .api
            .and_then(|api| api.base_url)
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        if base_url.is_empty() {
            return Err(MdexError::Config("api.base_url is empty".to_string()));
        }

        Ok(ResolvedConfig {
            schema_version,
            engine,
            api: ApiConfig { base_url },
        })
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        ProjectDirs::from("", "", "mdex-dl")
            .map(|dirs| dirs.config_dir().join("config.json"))
            .filter(|path| path.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.engine, EngineConfig::default());
        assert_eq!(resolved.api.base_url, DEFAULT_API_BASE);
    }
}
