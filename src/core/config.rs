//! Application configuration management
//!
//! This module handles loading and validating configuration from TOML files,
//! with command-line overrides applied on top. All values are validated at
//! startup so a misconfigured proxy fails before it binds.

use crate::core::constants::model;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default server port
const DEFAULT_PORT: u16 = 8080;

/// Default upstream request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT: u64 = 30;

/// Default graceful shutdown deadline in seconds
const DEFAULT_SHUTDOWN_TIMEOUT: u64 = 5;

/// Configuration file looked up when `CONFIG_PATH` is not set
const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_true")]
    pub console: bool,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            console: true,
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelpConfig {
    #[serde(default = "default_help_file")]
    pub file: PathBuf,
}

impl Default for HelpConfig {
    fn default() -> Self {
        Self {
            file: default_help_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_client_url")]
    pub base_url: String,
    #[serde(default = "default_client_model")]
    pub model: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_client_url(),
            model: default_client_model(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_shutdown_timeout() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT
}

fn default_upstream_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_help_file() -> PathBuf {
    PathBuf::from("README.md")
}

fn default_client_url() -> String {
    "http://localhost:8080/v1".to_string()
}

fn default_client_model() -> String {
    model::DEFAULT_CHAT.to_string()
}

/// Application configuration loaded from a TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default)]
    pub help: HelpConfig,
    /// Per-token USD prices keyed by model name (`default` for the rest)
    #[serde(default)]
    pub pricing: HashMap<String, f64>,
    #[serde(default)]
    pub client: ClientConfig,
}

impl Config {
    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or if a value is
    /// invalid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from `CONFIG_PATH`, or `config.toml` if present
    ///
    /// A file named by `CONFIG_PATH` must exist. Without it, a missing
    /// `config.toml` falls back to built-in defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_path(
            std::env::var_os("CONFIG_PATH").map(PathBuf::from),
            Path::new(DEFAULT_CONFIG_FILE),
        )
    }

    /// Load `explicit` if given, else `fallback` if it exists, else defaults
    fn from_path(explicit: Option<PathBuf>, fallback: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None if fallback.exists() => Self::from_file(fallback),
            None => Ok(Self::default()),
        }
    }

    /// Check every value that would otherwise fail later at runtime
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            bail!("server.port must be non-zero");
        }
        if self.server.shutdown_timeout == 0 {
            bail!("server.shutdown_timeout must be non-zero");
        }
        validate_url("upstream.base_url", &self.upstream.base_url)?;
        validate_url("client.base_url", &self.client.base_url)?;
        if self.upstream.request_timeout == 0 {
            bail!("upstream.request_timeout must be non-zero");
        }
        if self.client.request_timeout == 0 {
            bail!("client.request_timeout must be non-zero");
        }
        if let Some((model, price)) = self
            .pricing
            .iter()
            .find(|(_, price)| !price.is_finite() || **price < 0.0)
        {
            bail!("pricing.{} must be a non-negative number, got {}", model, price);
        }
        Ok(())
    }

    /// Address the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn validate_url(key: &str, url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        bail!("{} must start with http:// or https://, got {:?}", key, url)
    }
}
