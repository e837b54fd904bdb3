//! Configuration management for Quotagate.
//!
//! Settings come either from flat environment variables (read through the
//! `config` crate) or from a nested YAML file. Both paths end in
//! [`Settings::validate`], and any failure aborts startup.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use config::{Config, Environment};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{QuotagateError, Result};

/// Root settings object, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Application metadata and logging
    #[serde(default)]
    pub app: AppConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Quota, window and allow-list
    pub rate_limit: RateLimitConfig,

    /// State backend selection
    #[serde(default)]
    pub state: StateConfig,
}

/// Application-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment name
    #[serde(default = "default_env")]
    pub env: String,

    /// Service name reported in logs
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Default log filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            env: default_env(),
            service_name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_env() -> String {
    "dev".to_string()
}

fn default_service_name() -> String {
    "rate-limited-api".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

/// Rate limiting configuration consumed by the limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests admitted per window
    pub requests_per_window: u64,

    /// Window length in seconds
    pub window_seconds: u64,

    /// API keys allowed to call the protected resource
    pub allowed_api_keys: HashSet<String>,
}

impl RateLimitConfig {
    /// Build a configuration from its parts.
    pub fn new<I, K>(requests_per_window: u64, window_seconds: u64, allowed_api_keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            requests_per_window,
            window_seconds,
            allowed_api_keys: allowed_api_keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Check that quota and window are positive and at least one key is allowed.
    pub fn validate(&self) -> Result<()> {
        if self.requests_per_window == 0 {
            return Err(QuotagateError::Config(
                "requests_per_window must be greater than 0".to_string(),
            ));
        }
        if self.window_seconds == 0 {
            return Err(QuotagateError::Config(
                "window_seconds must be greater than 0".to_string(),
            ));
        }
        if self.allowed_api_keys.iter().all(|k| k.is_empty()) {
            return Err(QuotagateError::Config(
                "allowed_api_keys must contain at least one key".to_string(),
            ));
        }
        Ok(())
    }
}

/// Available state backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    File,
}

impl std::str::FromStr for BackendKind {
    type Err = QuotagateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "file" => Ok(BackendKind::File),
            other => Err(QuotagateError::Config(format!(
                "Unsupported state backend: {}",
                other
            ))),
        }
    }
}

/// State backend configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateConfig {
    /// Which backend stores rate limit state
    #[serde(default)]
    pub backend: BackendKind,

    /// JSON document path, required for the file backend
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

impl StateConfig {
    /// Check that the file backend has a path to write to.
    pub fn validate(&self) -> Result<()> {
        let missing_path = self
            .file_path
            .as_ref()
            .map_or(true, |p| p.as_os_str().is_empty());
        if self.backend == BackendKind::File && missing_path {
            return Err(QuotagateError::Config(
                "file_path must be set when state backend is 'file'".to_string(),
            ));
        }
        Ok(())
    }
}

/// Flat view of the environment variables, before nesting.
#[derive(Debug, Deserialize)]
struct EnvSettings {
    app_env: Option<String>,
    service_name: Option<String>,
    log_level: Option<String>,
    listen_addr: Option<String>,
    requests_per_window: Option<u64>,
    window_seconds: Option<u64>,
    allowed_api_keys: Option<String>,
    state_backend: Option<String>,
    state_file_path: Option<String>,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_environment(Environment::default())
    }

    /// Load settings from an `Environment` source.
    ///
    /// Split out from [`Settings::from_env`] so tests can supply variables
    /// without touching the process environment.
    pub fn from_environment(source: Environment) -> Result<Self> {
        let raw: EnvSettings = Config::builder()
            .add_source(source)
            .build()
            .and_then(Config::try_deserialize::<EnvSettings>)
            .map_err(|e| QuotagateError::Config(format!("Invalid configuration: {}", e)))?;

        let required = |value: Option<u64>, name: &str| {
            value.ok_or_else(|| {
                QuotagateError::Config(format!("Missing required environment variable: {}", name))
            })
        };

        let allowed_api_keys = raw
            .allowed_api_keys
            .ok_or_else(|| {
                QuotagateError::Config(
                    "Missing required environment variable: ALLOWED_API_KEYS".to_string(),
                )
            })?
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();

        let listen_addr = match raw.listen_addr {
            Some(addr) => addr.parse().map_err(|e| {
                QuotagateError::Config(format!("Invalid LISTEN_ADDR '{}': {}", addr, e))
            })?,
            None => default_listen_addr(),
        };

        let settings = Settings {
            app: AppConfig {
                env: raw.app_env.unwrap_or_else(default_env),
                service_name: raw.service_name.unwrap_or_else(default_service_name),
                log_level: raw.log_level.unwrap_or_else(default_log_level),
            },
            server: ServerConfig { listen_addr },
            rate_limit: RateLimitConfig {
                requests_per_window: required(raw.requests_per_window, "REQUESTS_PER_WINDOW")?,
                window_seconds: required(raw.window_seconds, "WINDOW_SECONDS")?,
                allowed_api_keys,
            },
            state: StateConfig {
                backend: match raw.state_backend {
                    Some(backend) => backend.parse()?,
                    None => BackendKind::default(),
                },
                file_path: raw.state_file_path.map(PathBuf::from),
            },
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration file");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(yaml)
            .map_err(|e| QuotagateError::Config(format!("Failed to parse configuration: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.rate_limit.validate()?;
        self.state.validate()
    }
}
