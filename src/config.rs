use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/v1";
const DEFAULT_RETURN_URL: &str = "http://localhost:5173/confirmation";
const DEFAULT_STORAGE_BACKEND: &str = "in-memory";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SESSION_RETRY_DELAY_MS: u64 = 700;
const DEFAULT_GUEST_ADDRESS_CAP: usize = 5;

/// Client-local storage configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Storage backend: "in-memory" or "file"
    #[serde(default = "default_storage_backend")]
    #[validate(custom = "validate_storage_backend")]
    pub backend: String,

    /// Path of the JSON state file when the "file" backend is selected
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: None,
        }
    }
}

/// Ordering-client configuration.
///
/// Constructed explicitly and passed into the API client and every service;
/// nothing in the crate reads configuration through a global. Tests build one
/// per case pointing at their own mock backend.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the backend REST API, including the version prefix
    #[validate(custom = "validate_base_url")]
    pub api_base_url: String,

    /// URL the payment gateway redirects back to after checkout
    #[validate(custom = "validate_base_url")]
    pub return_url: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// TCP connect timeout (seconds)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Delay schedule for the post-payment order fetch, in milliseconds.
    /// The first entry is the delay before the first attempt.
    #[serde(default = "default_order_fetch_delays_ms")]
    #[validate(custom = "validate_order_fetch_delays")]
    pub order_fetch_delays_ms: Vec<u64>,

    /// Delay before the single session-restore retry (milliseconds)
    #[serde(default = "default_session_retry_delay_ms")]
    pub session_retry_delay_ms: u64,

    /// Maximum number of locally cached guest addresses
    #[serde(default = "default_guest_address_cap")]
    pub guest_address_cap: usize,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Client-local storage configuration
    #[serde(default)]
    #[validate]
    pub storage: StorageConfig,
}

impl ClientConfig {
    /// Creates a configuration with defaults for everything but the URLs.
    pub fn new(api_base_url: impl Into<String>, return_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            return_url: return_url.into(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            order_fetch_delays_ms: default_order_fetch_delays_ms(),
            session_retry_delay_ms: default_session_retry_delay_ms(),
            guest_address_cap: default_guest_address_cap(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            storage: StorageConfig::default(),
        }
    }

    /// Joins an endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Error)]
pub enum ClientConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_storage_backend() -> String {
    DEFAULT_STORAGE_BACKEND.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_order_fetch_delays_ms() -> Vec<u64> {
    // Tolerates backend write-propagation lag after a payment redirect.
    vec![0, 800, 1500, 3000]
}

fn default_session_retry_delay_ms() -> u64 {
    DEFAULT_SESSION_RETRY_DELAY_MS
}

fn default_guest_address_cap() -> usize {
    DEFAULT_GUEST_ADDRESS_CAP
}

fn validate_storage_backend(value: &str) -> Result<(), ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "in-memory" | "file" => Ok(()),
        _ => {
            let mut err = ValidationError::new("storage_backend");
            err.message = Some("Must be one of: in-memory, file".into());
            Err(err)
        }
    }
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_base_url(value: &str) -> Result<(), ValidationError> {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => {
            let mut err = ValidationError::new("base_url");
            err.message = Some("Must be an absolute http(s) URL".into());
            Err(err)
        }
    }
}

fn validate_order_fetch_delays(delays: &Vec<u64>) -> Result<(), ValidationError> {
    if delays.is_empty() {
        let mut err = ValidationError::new("order_fetch_delays_ms");
        err.message = Some("At least one fetch attempt is required".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("tableside={}", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads client configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<ClientConfig, ClientConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("api_base_url", DEFAULT_API_BASE_URL)?
        .set_default("return_url", DEFAULT_RETURN_URL)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let client_config: ClientConfig = config.try_deserialize()?;

    client_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        ClientConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(client_config)
}
