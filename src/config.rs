//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `DEVCHAIN_*` environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cloud::AtlasConfig;
use crate::ledger::{GatewayConfig, LedgerSettings};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    #[serde(default)]
    pub cloud: CloudConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Key-value store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// sqlite, json or memory
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_backend() -> String {
    "sqlite".to_string()
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("devchain").to_string_lossy().to_string())
        .unwrap_or_else(|| "./devchain_data".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            data_dir: default_data_dir(),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Entry writes allowed per user within the window
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: usize,

    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_request_timeout() -> u64 {
    30
}

fn default_rate_limit_requests() -> usize {
    10
}

fn default_rate_limit_window() -> u64 {
    60
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            request_timeout_secs: default_request_timeout(),
            rate_limit_requests: default_rate_limit_requests(),
            rate_limit_window_secs: default_rate_limit_window(),
        }
    }
}

impl ApiConfig {
    /// Socket address string for binding
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Hedera ledger configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_network")]
    pub network: String,

    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    #[serde(default = "default_mirror_url")]
    pub mirror_url: String,

    pub api_key: Option<String>,

    pub operator_id: Option<String>,

    pub topic_id: Option<String>,

    pub badge_contract_id: Option<String>,

    #[serde(default = "default_true")]
    pub allow_local_fallback: bool,

    #[serde(default = "default_mint_gas")]
    pub mint_gas: u64,

    #[serde(default = "default_ledger_timeout")]
    pub request_timeout_ms: u64,
}

fn default_network() -> String {
    "testnet".to_string()
}

fn default_gateway_url() -> String {
    "http://localhost:7546".to_string()
}

fn default_mirror_url() -> String {
    "https://testnet.mirrornode.hedera.com".to_string()
}

fn default_true() -> bool {
    true
}

fn default_mint_gas() -> u64 {
    300_000
}

fn default_ledger_timeout() -> u64 {
    10_000
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            network: default_network(),
            gateway_url: default_gateway_url(),
            mirror_url: default_mirror_url(),
            api_key: None,
            operator_id: None,
            topic_id: None,
            badge_contract_id: None,
            allow_local_fallback: true,
            mint_gas: default_mint_gas(),
            request_timeout_ms: default_ledger_timeout(),
        }
    }
}

impl LedgerConfig {
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            gateway_url: self.gateway_url.clone(),
            mirror_url: self.mirror_url.clone(),
            operator_id: self.operator_id.clone(),
            api_key: self.api_key.clone(),
            request_timeout_ms: self.request_timeout_ms,
        }
    }

    pub fn settings(&self) -> LedgerSettings {
        LedgerSettings {
            network: self.network.clone(),
            topic_id: self.topic_id.clone(),
            badge_contract_id: self.badge_contract_id.clone(),
            mint_gas: self.mint_gas,
            allow_local_fallback: self.allow_local_fallback,
        }
    }
}

/// Email notification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// resend, web3forms, formspree or none
    #[serde(default = "default_notify_backend")]
    pub backend: String,

    #[serde(default = "default_notify_timeout")]
    pub request_timeout_secs: u64,

    pub resend_function_url: Option<String>,

    pub web3forms_access_key: Option<String>,

    pub formspree_form_id: Option<String>,

    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_notify_backend() -> String {
    "none".to_string()
}

fn default_notify_timeout() -> u64 {
    10
}

fn default_from_name() -> String {
    "DevChain".to_string()
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            backend: default_notify_backend(),
            request_timeout_secs: default_notify_timeout(),
            resend_function_url: None,
            web3forms_access_key: None,
            formspree_form_id: None,
            from_name: default_from_name(),
        }
    }
}

/// MongoDB Atlas Data API mirror configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CloudConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub data_api_url: String,

    pub api_key: Option<String>,

    #[serde(default = "default_data_source")]
    pub data_source: String,

    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default = "default_notify_timeout")]
    pub request_timeout_secs: u64,
}

fn default_data_source() -> String {
    "Cluster0".to_string()
}

fn default_database() -> String {
    "devchain".to_string()
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            data_api_url: String::new(),
            api_key: None,
            data_source: default_data_source(),
            database: default_database(),
            request_timeout_secs: default_notify_timeout(),
        }
    }
}

impl CloudConfig {
    /// Atlas settings, or `None` when the mirror is off or incomplete
    pub fn atlas_config(&self) -> Option<AtlasConfig> {
        if !self.enabled || self.data_api_url.is_empty() {
            return None;
        }
        Some(AtlasConfig {
            data_api_url: self.data_api_url.clone(),
            api_key: self.api_key.clone()?,
            data_source: self.data_source.clone(),
            database: self.database.clone(),
            request_timeout_secs: self.request_timeout_secs,
        })
    }
}

/// Reminder and digest scheduling
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    #[serde(default = "default_inactivity_days")]
    pub inactivity_days: i64,

    #[serde(default = "default_cooldown_days")]
    pub reminder_cooldown_days: i64,

    /// Three-letter or full weekday name
    #[serde(default = "default_digest_weekday")]
    pub digest_weekday: String,

    #[serde(default = "default_digest_hour")]
    pub digest_hour: u32,

    /// Offset of the local clock from UTC, in minutes
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

fn default_check_interval() -> u64 {
    3600
}

fn default_inactivity_days() -> i64 {
    3
}

fn default_cooldown_days() -> i64 {
    7
}

fn default_digest_weekday() -> String {
    "sun".to_string()
}

fn default_digest_hour() -> u32 {
    9
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_secs: default_check_interval(),
            inactivity_days: default_inactivity_days(),
            reminder_cooldown_days: default_cooldown_days(),
            digest_weekday: default_digest_weekday(),
            digest_hour: default_digest_hour(),
            utc_offset_minutes: 0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        for path in Self::default_paths() {
            if path.exists() {
                match Self::load_with_env(&path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Config file locations, in search order
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("devchain").join("config.toml")),
            Some(PathBuf::from("/etc/devchain/config.toml")),
            Some(PathBuf::from("./devchain.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `DEVCHAIN_*` overrides from any lookup
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Storage
        if let Some(v) = var("DEVCHAIN_STORAGE_BACKEND") {
            self.storage.backend = v;
        }
        if let Some(v) = var("DEVCHAIN_DATA_DIR") {
            self.storage.data_dir = v;
        }

        // API
        if let Some(v) = var("DEVCHAIN_API_HOST") {
            self.api.host = v;
        }
        if let Some(p) = var("DEVCHAIN_API_PORT").and_then(|v| v.parse().ok()) {
            self.api.port = p;
        }

        // Ledger
        if let Some(enabled) = var("DEVCHAIN_LEDGER_ENABLED").and_then(|v| v.parse().ok()) {
            self.ledger.enabled = enabled;
        }
        if let Some(v) = var("DEVCHAIN_LEDGER_NETWORK") {
            self.ledger.network = v;
        }
        if let Some(v) = var("DEVCHAIN_LEDGER_GATEWAY_URL") {
            self.ledger.gateway_url = v;
        }
        if let Some(v) = var("DEVCHAIN_LEDGER_API_KEY") {
            self.ledger.api_key = Some(v);
        }
        if let Some(v) = var("DEVCHAIN_OPERATOR_ID") {
            self.ledger.operator_id = Some(v);
        }
        if let Some(v) = var("DEVCHAIN_TOPIC_ID") {
            self.ledger.topic_id = Some(v);
        }
        if let Some(v) = var("DEVCHAIN_BADGE_CONTRACT_ID") {
            self.ledger.badge_contract_id = Some(v);
        }

        // Notifications
        if let Some(v) = var("DEVCHAIN_NOTIFY_BACKEND") {
            self.notifications.backend = v;
        }
        if let Some(v) = var("DEVCHAIN_RESEND_FUNCTION_URL") {
            self.notifications.resend_function_url = Some(v);
        }
        if let Some(v) = var("DEVCHAIN_WEB3FORMS_ACCESS_KEY") {
            self.notifications.web3forms_access_key = Some(v);
        }
        if let Some(v) = var("DEVCHAIN_FORMSPREE_FORM_ID") {
            self.notifications.formspree_form_id = Some(v);
        }

        // Cloud
        if let Some(v) = var("DEVCHAIN_ATLAS_DATA_API_URL") {
            self.cloud.data_api_url = v;
        }
        if let Some(v) = var("DEVCHAIN_ATLAS_API_KEY") {
            self.cloud.api_key = Some(v);
        }

        // Logging
        if let Some(v) = var("DEVCHAIN_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = var("DEVCHAIN_LOG_FORMAT") {
            self.logging.format = v;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# DevChain Configuration
#
# Environment variables override these settings:
# - DEVCHAIN_STORAGE_BACKEND, DEVCHAIN_DATA_DIR
# - DEVCHAIN_API_HOST, DEVCHAIN_API_PORT
# - DEVCHAIN_LEDGER_ENABLED, DEVCHAIN_LEDGER_NETWORK, DEVCHAIN_LEDGER_GATEWAY_URL
# - DEVCHAIN_LEDGER_API_KEY, DEVCHAIN_OPERATOR_ID, DEVCHAIN_TOPIC_ID, DEVCHAIN_BADGE_CONTRACT_ID
# - DEVCHAIN_NOTIFY_BACKEND, DEVCHAIN_RESEND_FUNCTION_URL
# - DEVCHAIN_WEB3FORMS_ACCESS_KEY, DEVCHAIN_FORMSPREE_FORM_ID
# - DEVCHAIN_ATLAS_DATA_API_URL, DEVCHAIN_ATLAS_API_KEY
# - DEVCHAIN_LOG_LEVEL, DEVCHAIN_LOG_FORMAT

[storage]
# Key-value backend: sqlite, json or memory
backend = "sqlite"

# Directory for storing data files
data_dir = "~/.local/share/devchain"

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8082

# Allowed CORS origins
cors_origins = ["http://localhost:5173", "http://127.0.0.1:5173"]

# Request timeout in seconds
request_timeout_secs = 30

# Entry writes allowed per user per window
rate_limit_requests = 10
rate_limit_window_secs = 60

[ledger]
# Anchor entries and mint badges on Hedera
enabled = false

# testnet, previewnet or mainnet (used for explorer links)
network = "testnet"

# Signing gateway that holds the operator key
gateway_url = "http://localhost:7546"

# Public mirror node for transaction lookups
mirror_url = "https://testnet.mirrornode.hedera.com"

# api_key = ""
# operator_id = "0.0.1234"
# topic_id = "0.0.5678"
# badge_contract_id = "0.0.9012"

# Keep a local placeholder id when the network is unreachable
allow_local_fallback = true

# Gas limit for badge mints
mint_gas = 300000

# Request timeout in milliseconds
request_timeout_ms = 10000

[notifications]
# resend, web3forms, formspree or none
backend = "none"

# resend_function_url = "https://example.netlify.app/.netlify/functions/send-email"
# web3forms_access_key = ""
# formspree_form_id = ""

# Sender name for Web3Forms
from_name = "DevChain"

request_timeout_secs = 10

[cloud]
# Mirror users and entries to MongoDB Atlas
enabled = false

# data_api_url = "https://data.mongodb-api.com/app/<app-id>/endpoint/data/v1"
# api_key = ""
data_source = "Cluster0"
database = "devchain"

[scheduler]
# Send inactivity reminders and weekly digests
enabled = true

# How often the scheduler wakes up (seconds)
check_interval_secs = 3600

# Remind users idle for this many days
inactivity_days = 3

# At most one reminder per user in this many days
reminder_cooldown_days = 7

# Weekly digest slot, in local time
digest_weekday = "sun"
digest_hour = 9
utc_offset_minutes = 0

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/devchain/devchain.log"
"#
    .to_string()
}
