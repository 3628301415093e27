use crate::error::*;
use crate::quota::{classify, FailureClass};
use tracing::{error, info, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::YouTubeApi(e) => {
                error!("YouTube API error details: {:?}", e);
            }
            CoreError::Storage(e) => {
                error!("Storage error details: {:?}", e);
            }
            CoreError::Render(e) => {
                error!("Render error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        classify(self) == FailureClass::Transient
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::YouTubeApi(e) => e.user_friendly_message(),
            CoreError::Storage(e) => e.user_friendly_message(),
            CoreError::Render(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Quota(halt) => format!(
                "The YouTube Data API quota is exhausted ({}). Rows written so far are kept; run again after the quota resets.",
                halt.operation
            ),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::InvalidInput { .. } => {
                "Invalid input provided. Please check your input and try again.".to_string()
            }
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::YouTubeApi(_) => "YOUTUBE_API".to_string(),
            CoreError::Storage(_) => "STORAGE".to_string(),
            CoreError::Render(_) => "RENDER".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Quota(_) => "QUOTA_EXCEEDED".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ErrorExt for YouTubeApiError {
    fn log_error(&self) -> &Self {
        error!("YouTubeApiError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("YouTubeApiError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            YouTubeApiError::RequestTimeout
                | YouTubeApiError::ConnectionFailed { .. }
                | YouTubeApiError::ServerError { .. }
        )
    }

    fn user_friendly_message(&self) -> String {
        match self {
            YouTubeApiError::QuotaExceeded { .. } => {
                "YouTube Data API quota exceeded. Processing has stopped.".to_string()
            }
            YouTubeApiError::Rejected { status, .. } => format!(
                "YouTube rejected the request (HTTP {}). Check the API key and parameters.",
                status
            ),
            YouTubeApiError::NotFound { resource } => {
                format!("YouTube resource '{}' was not found.", resource)
            }
            YouTubeApiError::RequestTimeout => {
                "Request to YouTube timed out. Please try again.".to_string()
            }
            YouTubeApiError::ConnectionFailed { .. } => {
                "Could not reach YouTube. Please check your connection.".to_string()
            }
            _ => "YouTube API error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            YouTubeApiError::QuotaExceeded { .. } => "YOUTUBE_QUOTA_EXCEEDED".to_string(),
            YouTubeApiError::Rejected { .. } => "YOUTUBE_REJECTED".to_string(),
            YouTubeApiError::NotFound { .. } => "YOUTUBE_NOT_FOUND".to_string(),
            YouTubeApiError::RequestTimeout => "YOUTUBE_TIMEOUT".to_string(),
            YouTubeApiError::ConnectionFailed { .. } => "YOUTUBE_CONNECTION_FAILED".to_string(),
            YouTubeApiError::InvalidResponse { .. } => "YOUTUBE_INVALID_RESPONSE".to_string(),
            YouTubeApiError::ServerError { .. } => "YOUTUBE_SERVER_ERROR".to_string(),
        }
    }
}

impl ErrorExt for StorageError {
    fn log_error(&self) -> &Self {
        error!("StorageError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("StorageError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::DatabaseLocked | StorageError::ConnectionFailed { .. }
        )
    }

    fn user_friendly_message(&self) -> String {
        match self {
            StorageError::ConnectionFailed { .. } => {
                "Database connection failed. Please check the database path.".to_string()
            }
            StorageError::DatabaseLocked => {
                "Database is locked by another process. Close it and run again.".to_string()
            }
            _ => "Database error occurred. Output may not be durable until it is resolved."
                .to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            StorageError::ConnectionFailed { .. } => "DB_CONNECTION_FAILED".to_string(),
            StorageError::MigrationFailed { .. } => "DB_MIGRATION_FAILED".to_string(),
            StorageError::DatabaseLocked => "DB_LOCKED".to_string(),
            StorageError::Sql(_) => "DB_SQL_ERROR".to_string(),
        }
    }
}

impl ErrorExt for RenderError {
    fn log_error(&self) -> &Self {
        error!("RenderError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("RenderError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            RenderError::Transport { .. } | RenderError::Timeout { .. } => true,
            RenderError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RenderError::Transport { .. } => {
                "Could not reach the page renderer. Is the Browserless service running?"
                    .to_string()
            }
            RenderError::Timeout { url } => format!("Rendering {} timed out.", url),
            RenderError::Api { status, .. } => {
                format!("The page renderer answered with HTTP {}.", status)
            }
            RenderError::InvalidUrl { url } => format!("'{}' is not a renderable URL.", url),
        }
    }

    fn error_code(&self) -> String {
        match self {
            RenderError::Transport { .. } => "RENDER_TRANSPORT".to_string(),
            RenderError::Timeout { .. } => "RENDER_TIMEOUT".to_string(),
            RenderError::Api { .. } => "RENDER_API".to_string(),
            RenderError::InvalidUrl { .. } => "RENDER_INVALID_URL".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false // Config errors need user intervention
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file '{}' not found.", path)
            }
            ConfigError::MissingField { field } => {
                format!("Required configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::Parse(_) => {
                "Configuration file format is invalid. Please check the settings.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

pub struct ErrorReporter {
    report_errors: bool,
    report_warnings: bool,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            report_errors: true,
            report_warnings: true,
        }
    }

    pub fn with_error_reporting(mut self, enabled: bool) -> Self {
        self.report_errors = enabled;
        self
    }

    pub fn with_warning_reporting(mut self, enabled: bool) -> Self {
        self.report_warnings = enabled;
        self
    }

    pub fn report_error(&self, error: &CoreError) {
        if self.report_errors {
            error.log_error();
            info!("Error code: {}", error.error_code());
            info!("User message: {}", error.user_friendly_message());
        }
    }

    pub fn report_warning(&self, error: &CoreError) {
        if self.report_warnings {
            error.log_warn();
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}
