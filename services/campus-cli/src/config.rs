//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults.
//! The config file itself comes from `--config`, then `CONFIG_PATH`, then
//! `campus-cli.toml` in the working directory. Only the default location
//! may be missing.

use api_client::RefreshPolicy;
use api_client::url::DEFAULT_BASE_URL;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "campus-cli.toml";
const DEFAULT_STORE_FILE: &str = "campus-session.json";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
}

/// Remote API settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// Session store location
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

/// Token refresh behaviour
#[derive(Debug, Deserialize)]
pub struct RefreshConfig {
    /// Sign out when the refresh endpoint cannot be reached.
    #[serde(default = "default_clear_on_transport_error")]
    pub clear_on_transport_error: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            clear_on_transport_error: default_clear_on_transport_error(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_FILE)
}

fn default_clear_on_transport_error() -> bool {
    RefreshPolicy::default().clear_on_transport_error
}

/// Where the config file was found and whether the user asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    pub path: PathBuf,
    /// Named by `--config` or `CONFIG_PATH`; must exist.
    pub explicit: bool,
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Environment overrides:
    /// - `API_BASE_URL` replaces `api.base_url`
    /// - `CAMPUS_STORE_PATH` replaces `storage.path`
    pub fn load(location: &ConfigLocation) -> common::Result<Self> {
        let mut config = match std::fs::read_to_string(&location.path) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !location.explicit => {
                Config::default()
            }
            Err(e) => return Err(e.into()),
        };

        if let Ok(url) = std::env::var("API_BASE_URL")
            && !url.trim().is_empty()
        {
            config.api.base_url = url.trim().to_string();
        }
        if let Ok(path) = std::env::var("CAMPUS_STORE_PATH")
            && !path.trim().is_empty()
        {
            config.storage.path = PathBuf::from(path.trim());
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }
        if self.storage.path.as_os_str().is_empty() {
            return Err(common::Error::Config("storage path must not be empty".into()));
        }
        Ok(())
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        RefreshPolicy {
            clear_on_transport_error: self.refresh.clear_on_transport_error,
        }
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> ConfigLocation {
        if let Some(p) = cli_path {
            return ConfigLocation {
                path: PathBuf::from(p),
                explicit: true,
            };
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return ConfigLocation {
                path: PathBuf::from(p),
                explicit: true,
            };
        }
        ConfigLocation {
            path: PathBuf::from(DEFAULT_CONFIG_FILE),
            explicit: false,
        }
    }
}

/// Shorthand for tests and callers holding a bare path.
impl From<&Path> for ConfigLocation {
    fn from(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            explicit: true,
        }
    }
}
