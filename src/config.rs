use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

use crate::services::codes::CodeStrategy;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";

/// How strictly document status changes are checked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Only transitions listed in the status tables are accepted.
    #[default]
    Strict,
    /// Any enumerated status may follow any other.
    Permissive,
}

/// Code generation strategy per document type.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CodeSettings {
    #[serde(default = "default_counter_strategy")]
    pub customer: CodeStrategy,
    #[serde(default = "default_counter_strategy")]
    pub supplier: CodeStrategy,
    #[serde(default = "default_counter_strategy")]
    pub item: CodeStrategy,
    #[serde(default = "default_counter_strategy")]
    pub quotation: CodeStrategy,
    #[serde(default = "default_timestamp_strategy")]
    pub production: CodeStrategy,
    #[serde(default = "default_counter_strategy")]
    pub sale: CodeStrategy,
    #[serde(default = "default_counter_strategy")]
    pub payment: CodeStrategy,
    #[serde(default = "default_timestamp_strategy")]
    pub purchase: CodeStrategy,

    /// Digits used by the sequential strategies.
    #[serde(default = "default_code_padding")]
    #[validate(range(min = 1, max = 12))]
    pub padding: usize,
}

impl Default for CodeSettings {
    fn default() -> Self {
        Self {
            customer: CodeStrategy::Counter,
            supplier: CodeStrategy::Counter,
            item: CodeStrategy::Counter,
            quotation: CodeStrategy::Counter,
            production: CodeStrategy::Timestamp,
            sale: CodeStrategy::Counter,
            payment: CodeStrategy::Counter,
            purchase: CodeStrategy::Timestamp,
            padding: default_code_padding(),
        }
    }
}

/// Business rules that can be tuned per deployment.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LedgerSettings {
    #[serde(default)]
    pub transition_policy: TransitionPolicy,

    /// Allowed absolute difference between a submitted price and the catalog price.
    #[serde(default = "default_price_tolerance")]
    #[validate(custom = "validate_tolerance")]
    pub price_tolerance: Decimal,

    /// Reject production and sale items whose total differs from price per piece times quantity.
    #[serde(default)]
    pub verify_item_totals: bool,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            transition_policy: TransitionPolicy::Strict,
            price_tolerance: default_price_tolerance(),
            verify_item_totals: false,
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1, max = 500))]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Capacity of the domain event channel
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,

    #[serde(default)]
    #[validate]
    pub codes: CodeSettings,

    #[serde(default)]
    #[validate]
    pub ledger: LedgerSettings,
}

impl AppConfig {
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            codes: CodeSettings::default(),
            ledger: LedgerSettings::default(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == DEFAULT_ENV
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_counter_strategy() -> CodeStrategy {
    CodeStrategy::Counter
}

fn default_timestamp_strategy() -> CodeStrategy {
    CodeStrategy::Timestamp
}

fn default_code_padding() -> usize {
    5
}

fn default_price_tolerance() -> Decimal {
    crate::services::ledger::PRICE_TOLERANCE
}

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

fn validate_tolerance(tolerance: &Decimal) -> Result<(), ValidationError> {
    if tolerance.is_sign_negative() {
        let mut err = ValidationError::new("price_tolerance");
        err.message = Some("Price tolerance cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("bagworks_erp={},sea_orm=warn", level);
    let filter = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(default_directive));

    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://bagworks.db?mode=rwc")?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(&run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
