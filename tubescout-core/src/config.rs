use crate::error::ConfigError;
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub const API_KEY_ENV: &str = "YOUTUBE_API_KEY";

/// Full run configuration. Loaded once in `main` and passed by value into the
/// pipeline constructors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub api_key: String,
    pub queries: Vec<String>,
    /// Search lower bound, in days before now.
    pub days_back: i64,
    pub region_code: String,
    /// ISO 639-3 code the language gate must match exactly.
    pub target_language: String,
    /// Channels must have strictly fewer subscribers than this.
    pub subscriber_ceiling: u64,
    pub page_size: u32,
    pub max_channels: Option<usize>,
    pub database_url: String,
    pub retry: RetrySettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSettings {
    pub browserless_url: String,
    pub browserless_token: Option<String>,
    pub hl: String,
    pub gl: String,
    pub main_settle_ms: u64,
    pub subpage_settle_ms: u64,
    pub consent_wait_ms: u64,
    pub timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            queries: Vec::new(),
            days_back: 365,
            region_code: "FR".to_string(),
            target_language: "fra".to_string(),
            subscriber_ceiling: 50_000,
            page_size: 50,
            max_channels: None,
            database_url: "sqlite://tubescout.db".to_string(),
            retry: RetrySettings::default(),
            render: RenderSettings::default(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_secs: 5,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            browserless_url: "http://localhost:3000".to_string(),
            browserless_token: None,
            hl: "en".to_string(),
            gl: "US".to_string(),
            main_settle_ms: 3000,
            subpage_settle_ms: 2000,
            consent_wait_ms: 5000,
            timeout_secs: 30,
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.max_attempts, Duration::from_secs(self.delay_secs))
    }
}

impl AppConfig {
    /// Read a TOML file, apply the environment override and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;

        info!(
            queries = config.queries.len(),
            region = %config.region_code,
            language = %config.target_language,
            "Configuration ready"
        );
        Ok(config)
    }

    /// Like [`AppConfig::load`] without validation, for commands that only
    /// touch the database.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidValue {
            field: "config_path".to_string(),
            value: format!("{}: {}", path.display(), e),
        })?;
        debug!("Loaded configuration from {}", path.display());

        let mut config = Self::from_toml(&content)?;
        config.apply_env_override(std::env::var(API_KEY_ENV).ok());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// A non-empty environment value replaces the file's API key.
    pub fn apply_env_override(&mut self, api_key: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            debug!("Using API key from {}", API_KEY_ENV);
            self.api_key = key;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "api_key".to_string(),
            });
        }
        if self.queries.iter().all(|q| q.trim().is_empty()) {
            return Err(ConfigError::MissingField {
                field: "queries".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts".to_string(),
                value: "0".to_string(),
            });
        }
        if self.page_size == 0 || self.page_size > 50 {
            return Err(ConfigError::InvalidValue {
                field: "page_size".to_string(),
                value: self.page_size.to_string(),
            });
        }
        Ok(())
    }
}
