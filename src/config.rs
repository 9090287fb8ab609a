//! Lookup configuration.
//!
//! Values are layered: built-in defaults, then `config.toml` (platform config
//! dir or an explicit path), then environment variables, then CLI overrides.
//!
//! ```toml
//! endpoint = "https://script.google.com/macros/s/XXXX/exec"
//! timeout_ms = 15000
//! page_url = "http://localhost:8080/"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const ENV_ENDPOINT: &str = "LOTVIEW_ENDPOINT";
pub const ENV_TIMEOUT_MS: &str = "LOTVIEW_TIMEOUT_MS";

const DEFAULT_PAGE_URL: &str = "http://localhost:8080/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid {field} URL {value:?}: {source}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        source: url::ParseError,
    },

    #[error("invalid {field} value {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("no lookup endpoint configured (set LOTVIEW_ENDPOINT, pass --endpoint, or add `endpoint` to config.toml)")]
    MissingEndpoint,
}

/// On-disk shape of `config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    endpoint: Option<String>,
    timeout_ms: Option<u64>,
    user_agent: Option<String>,
    page_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LookupConfig {
    /// Base URL of the remote lookup service.
    pub endpoint: Option<Url>,
    /// Per-request timeout; `None` waits for the remote indefinitely.
    pub request_timeout: Option<Duration>,
    pub user_agent: String,
    /// Address of the page session the controller boots from.
    pub page_url: Url,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout: None,
            user_agent: concat!("lotview/", env!("CARGO_PKG_VERSION")).to_string(),
            page_url: Url::parse(DEFAULT_PAGE_URL).expect("default page url is valid"),
        }
    }
}

/// Overrides supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl LookupConfig {
    /// Defaults, config file, environment, then `overrides`.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        let explicit = overrides.config_path.is_some();
        if let Some(path) = overrides.config_path.clone().or_else(default_config_path)
            && (explicit || path.exists())
        {
            cfg.apply_file(&path)?;
        }

        cfg.apply_env()?;

        if let Some(endpoint) = &overrides.endpoint {
            cfg.endpoint = Some(parse_url("endpoint", endpoint)?);
        }
        if let Some(ms) = overrides.timeout_ms {
            cfg.request_timeout = timeout_from_ms(ms);
        }
        Ok(cfg)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");

        if let Some(endpoint) = file.endpoint {
            self.endpoint = Some(parse_url("endpoint", &endpoint)?);
        }
        if let Some(ms) = file.timeout_ms {
            self.request_timeout = timeout_from_ms(ms);
        }
        if let Some(agent) = file.user_agent {
            self.user_agent = agent;
        }
        if let Some(page) = file.page_url {
            self.page_url = parse_url("page_url", &page)?;
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(endpoint) = dotenvy::var(ENV_ENDPOINT)
            && !endpoint.trim().is_empty()
        {
            self.endpoint = Some(parse_url("endpoint", endpoint.trim())?);
        }
        if let Ok(val) = dotenvy::var(ENV_TIMEOUT_MS) {
            let ms = val.trim().parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
                field: ENV_TIMEOUT_MS,
                value: val.clone(),
            })?;
            self.request_timeout = timeout_from_ms(ms);
        }
        Ok(())
    }

    /// The endpoint, or an error explaining how to set one.
    pub fn require_endpoint(&self) -> Result<&Url, ConfigError> {
        self.endpoint.as_ref().ok_or(ConfigError::MissingEndpoint)
    }
}

/// `0` disables the timeout.
fn timeout_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        source,
    })
}

/// `config.toml` in the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "lot-lookup", "lotview")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
