//! Configuration management
//!
//! This module handles loading, validation, and management of the LifeOS configuration.
//! Configuration is stored in TOML format at ~/.lifeos/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: log level, data directory
//! - **llm**: model provider endpoint, model name, timeout, system instruction
//! - **retry**: attempt budget and backoff base for plan generation
//! - **scheduler**: intent queue drain interval and dead-letter threshold
//! - **server**: bind address and allowed CORS origins
//! - **storage**: in-memory or SQLite state store
//! - **calendar** / **payments**: effector endpoints
//!
//! Credentials are never read from this file. They come from the environment
//! or from `credentials.toml` in the data directory (see [`crate::secrets`]).
//!
//! # Examples
//!
//! ```no_run
//! use lifeos_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Model: {}", config.llm.model);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Model provider configuration
    #[serde(default)]
    pub llm: LLMConfig,

    /// Plan generation retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Intent queue scheduler
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// HTTP server
    #[serde(default)]
    pub server: ServerConfig,

    /// State store backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Calendar effector
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// Payment effector
    #[serde(default)]
    pub payments: PaymentsConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Model provider configuration (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Base URL for the chat completions API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Overrides the built-in system instruction. `LIFEOS_SYSTEM_INSTRUCTION`
    /// takes precedence over this value.
    #[serde(default)]
    pub system_instruction: Option<String>,

    /// Number of memory records replayed into each command prompt
    #[serde(default = "default_memory_window")]
    pub memory_window: usize,
    // Note: API key read from OPENAI_API_KEY, not from config
}

/// Retry policy for plan generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles for each later attempt
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: u64,
}

/// Intent queue scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between drain cycles
    #[serde(default = "default_drain_interval")]
    pub drain_interval_secs: u64,

    /// Failed attempts before a queued command is dead-lettered
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Origins allowed by CORS. Empty allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Which state store implementation backs the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

/// State store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// SQLite database path (supports ~ expansion). Defaults to
    /// `<data_dir>/lifeos.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Calendar API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_calendar_base_url")]
    pub base_url: String,

    /// Whole-request timeout for calendar calls
    #[serde(default = "default_effector_timeout")]
    pub timeout_secs: u64,
    // Note: credentials read from CALENDAR_CREDENTIALS, not from config
}

/// Payment API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    #[serde(default = "default_payments_base_url")]
    pub base_url: String,

    /// ISO currency code for sweeps
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Amount swept when the action carries no usable amount
    #[serde(default = "default_sweep_amount")]
    pub default_amount: f64,

    /// Destination account for sweeps
    #[serde(default = "default_destination")]
    pub destination: String,

    #[serde(default = "default_effector_timeout")]
    pub timeout_secs: u64,
    // Note: API key read from PAYMENT_API_KEY, not from config
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.lifeos")
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_llm_timeout() -> u64 {
    25
}

fn default_memory_window() -> usize {
    10
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay() -> u64 {
    1
}

fn default_drain_interval() -> u64 {
    5
}

fn default_max_failures() -> u32 {
    5
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_backend() -> StorageBackend {
    StorageBackend::Sqlite
}

fn default_calendar_base_url() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

fn default_payments_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_sweep_amount() -> f64 {
    100.0
}

fn default_destination() -> String {
    "savings".to_string()
}

fn default_effector_timeout() -> u64 {
    15
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
            system_instruction: None,
            memory_window: default_memory_window(),
        }
    }
}

impl LLMConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl CalendarConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PaymentsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            drain_interval_secs: default_drain_interval(),
            max_failures: default_max_failures(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_origins: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            base_url: default_calendar_base_url(),
            timeout_secs: default_effector_timeout(),
        }
    }
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            base_url: default_payments_base_url(),
            currency: default_currency(),
            default_amount: default_sweep_amount(),
            destination: default_destination(),
            timeout_secs: default_effector_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            llm: LLMConfig::default(),
            retry: RetryConfig::default(),
            scheduler: SchedulerConfig::default(),
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            calendar: CalendarConfig::default(),
            payments: PaymentsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.lifeos/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default();

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.lifeos/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".lifeos").join("config.toml"))
    }

    /// Path of the SQLite database for the persistent store
    /// Credentials file consulted after the environment
    pub fn credentials_path(&self) -> PathBuf {
        self.core.data_dir.join("credentials.toml")
    }

    pub fn database_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| self.core.data_dir.join("lifeos.db"))
    }

    /// Validate and process configuration
    ///
    /// This method:
    /// - Validates log level and numeric bounds
    /// - Expands ~ in paths
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.retry.max_attempts == 0 {
            return Err(EngineError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.llm.timeout_secs == 0 {
            return Err(EngineError::Config(
                "llm.timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.scheduler.drain_interval_secs == 0 {
            return Err(EngineError::Config(
                "scheduler.drain_interval_secs must be at least 1".to_string(),
            ));
        }

        if self.scheduler.max_failures == 0 {
            return Err(EngineError::Config(
                "scheduler.max_failures must be at least 1".to_string(),
            ));
        }

        if self.calendar.timeout_secs == 0 || self.payments.timeout_secs == 0 {
            return Err(EngineError::Config(
                "calendar.timeout_secs and payments.timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.payments.default_amount.is_nan() || self.payments.default_amount <= 0.0 {
            return Err(EngineError::Config(
                "payments.default_amount must be positive".to_string(),
            ));
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;
        if let Some(path) = &self.storage.path {
            self.storage.path = Some(expand_path(path)?);
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
