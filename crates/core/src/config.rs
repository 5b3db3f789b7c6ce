use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable that overrides the configured API base URL.
pub const API_URL_ENV: &str = "MODELDECK_API_URL";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Backend API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Where downloaded datasets, reports and results are written
    #[serde(default)]
    pub downloads: DownloadsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds (0 keeps the HTTP client default)
    #[serde(default)]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadsConfig {
    /// Target directory (default: the user's download dir, else the cwd)
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_base_url() -> String {
    "http://localhost/api".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: 0,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Config {
    /// Get the base directory: ~/.config/modeldeck/
    pub fn base_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("USERPROFILE").map(PathBuf::from))
            .map_err(|_| Error::Config("Could not determine home directory".to_string()))?;
        Ok(home.join(".config").join("modeldeck"))
    }

    /// Load config from default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            Self::from_toml(&content)
        } else {
            Ok(Config::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Save config to default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;
        Ok(())
    }

    /// Get the config file path: ~/.config/modeldeck/config.toml
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.toml"))
    }

    /// Get the logs directory: ~/.config/modeldeck/logs/
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("logs"))
    }

    /// Resolve the API base URL: explicit override, then the environment,
    /// then the config file value.
    pub fn resolve_base_url(&self, flag: Option<&str>) -> String {
        self.resolve_base_url_with(flag, std::env::var(API_URL_ENV).ok())
    }

    fn resolve_base_url_with(&self, flag: Option<&str>, env: Option<String>) -> String {
        flag.map(str::to_string)
            .or(env.filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| self.api.base_url.clone())
    }

    /// Directory downloads are written to.
    pub fn downloads_dir(&self) -> PathBuf {
        self.downloads
            .directory
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn get(&self, key: &str) -> Result<String> {
        match key {
            "api.base_url" => Ok(self.api.base_url.clone()),
            "api.timeout_secs" => Ok(self.api.timeout_secs.to_string()),
            "downloads.directory" => Ok(self
                .downloads
                .directory
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()),
            _ => Err(Error::Config(format!("Unknown config key: {}", key))),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "api.base_url" => self.api.base_url = value.to_string(),
            "api.timeout_secs" => {
                self.api.timeout_secs = value
                    .parse()
                    .map_err(|_| Error::Config(format!("Invalid number: {}", value)))?
            }
            "downloads.directory" => {
                self.downloads.directory = if value.is_empty() {
                    None
                } else {
                    Some(value.into())
                }
            }
            _ => return Err(Error::Config(format!("Unknown config key: {}", key))),
        }
        Ok(())
    }
}
