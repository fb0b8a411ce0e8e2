use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ServiceError, ServiceResult};

/// Service configuration, read once at startup
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub assistant: AssistantConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound for non-streaming requests in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Which chat store backs persistence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub backend: StoreBackend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: StoreBackend::default(),
        }
    }
}

/// Bearer tokens accepted by the API, mapped to the user id they authenticate
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

/// Assistant behavior
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    /// City used when a weather request names no recognizable place
    #[serde(default = "default_location")]
    pub default_location: String,

    /// Ticker used when a stock request names no recognizable symbol
    #[serde(default = "default_symbol")]
    pub default_symbol: String,

    #[serde(default = "default_locale")]
    pub locale: String,

    /// Delay between streamed words in milliseconds
    #[serde(default = "default_word_delay_ms")]
    pub word_delay_ms: u64,

    /// Delay before the tool result frame in milliseconds
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            default_location: default_location(),
            default_symbol: default_symbol(),
            locale: default_locale(),
            word_delay_ms: default_word_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl AssistantConfig {
    pub fn word_delay(&self) -> Duration {
        Duration::from_millis(self.word_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// External data providers
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// Hard limit for a single provider call in seconds
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub weather: WeatherProviderConfig,

    #[serde(default)]
    pub motorsport: MotorsportProviderConfig,

    #[serde(default)]
    pub equity: EquityProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_provider_timeout_secs(),
            weather: WeatherProviderConfig::default(),
            motorsport: MotorsportProviderConfig::default(),
            equity: EquityProviderConfig::default(),
        }
    }
}

impl ProvidersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Open-Meteo style geocoding + forecast endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherProviderConfig {
    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,

    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,
}

impl Default for WeatherProviderConfig {
    fn default() -> Self {
        Self {
            geocoding_url: default_geocoding_url(),
            forecast_url: default_forecast_url(),
        }
    }
}

/// Ergast-compatible motorsport API
#[derive(Debug, Clone, Deserialize)]
pub struct MotorsportProviderConfig {
    #[serde(default = "default_motorsport_url")]
    pub base_url: String,
}

impl Default for MotorsportProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_motorsport_url(),
        }
    }
}

/// Alpha Vantage style quote API
#[derive(Debug, Clone, Deserialize)]
pub struct EquityProviderConfig {
    #[serde(default = "default_equity_url")]
    pub base_url: String,

    /// Without a key every quote is reported unavailable
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for EquityProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_equity_url(),
            api_key: None,
        }
    }
}

/// Load service configuration from an optional `config.*` file and
/// `TIDINGS__*` environment variables
pub fn load_service_config() -> ServiceResult<ServiceConfig> {
    load("config", "TIDINGS")
}

/// Load a config struct from an optional file and a prefixed environment
pub fn load<T: serde::de::DeserializeOwned>(file: &str, env_prefix: &str) -> ServiceResult<T> {
    Config::builder()
        .add_source(File::with_name(file).required(false))
        .add_source(
            Environment::with_prefix(env_prefix)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to build config: {}", e),
        })?
        .try_deserialize()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to deserialize config: {}", e),
        })
}

// ==================== Default Value Functions ====================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_location() -> String {
    "New York".to_string()
}

fn default_symbol() -> String {
    "AAPL".to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_word_delay_ms() -> u64 {
    30
}

fn default_settle_delay_ms() -> u64 {
    200
}

fn default_provider_timeout_secs() -> u64 {
    5
}

fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com/v1/search".to_string()
}

fn default_forecast_url() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

fn default_motorsport_url() -> String {
    "https://api.jolpi.ca/ergast/f1".to_string()
}

fn default_equity_url() -> String {
    "https://www.alphavantage.co/query".to_string()
}
