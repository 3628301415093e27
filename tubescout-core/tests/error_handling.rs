use tubescout_core::{
    classify, ConfigError, CoreError, ErrorExt, ErrorReporter, FailureClass, QuotaExceeded,
    RenderError, StorageError, YouTubeApiError,
};

#[test]
fn test_error_codes() {
    let api_error = CoreError::YouTubeApi(YouTubeApiError::RequestTimeout);
    assert_eq!(api_error.error_code(), "YOUTUBE_API");

    let db_error = CoreError::Storage(StorageError::DatabaseLocked);
    assert_eq!(db_error.error_code(), "STORAGE");

    let render_error = CoreError::Render(RenderError::InvalidUrl {
        url: "ftp://example.invalid".to_string(),
    });
    assert_eq!(render_error.error_code(), "RENDER");

    let quota = CoreError::Quota(QuotaExceeded {
        operation: "search".to_string(),
        detail: "daily limit".to_string(),
    });
    assert_eq!(quota.error_code(), "QUOTA_EXCEEDED");

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "api_key".to_string(),
    });
    assert_eq!(config_error.error_code(), "CONFIG");
}

#[test]
fn test_retryable_errors() {
    let retryable_error = CoreError::YouTubeApi(YouTubeApiError::ServerError { status_code: 502 });
    assert!(retryable_error.is_retryable());

    let quota_error = CoreError::YouTubeApi(YouTubeApiError::QuotaExceeded {
        status: 403,
        reason: "quotaExceeded".to_string(),
    });
    assert!(!quota_error.is_retryable());
    assert_eq!(classify(&quota_error), FailureClass::Quota);

    let non_retryable_error = CoreError::Config(ConfigError::MissingField {
        field: "api_key".to_string(),
    });
    assert!(!non_retryable_error.is_retryable());
}

#[test]
fn test_user_friendly_messages() {
    let api_error = CoreError::YouTubeApi(YouTubeApiError::QuotaExceeded {
        status: 429,
        reason: "quotaExceeded".to_string(),
    });
    let message = api_error.user_friendly_message();
    assert!(message.contains("quota exceeded"));

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "api_key".to_string(),
    });
    let message = config_error.user_friendly_message();
    assert!(!message.is_empty());
    assert!(message.contains("api_key"));
}

#[test]
fn test_error_reporter() {
    let reporter = ErrorReporter::new()
        .with_error_reporting(true)
        .with_warning_reporting(true);
    let error = CoreError::Render(RenderError::Transport {
        reason: "connection refused".to_string(),
    });

    // This test just ensures the methods don't panic
    reporter.report_error(&error);
    reporter.report_warning(&error);
}

#[test]
fn test_quota_halt_report() {
    let halt = CoreError::Quota(QuotaExceeded {
        operation: "channels.list statistics".to_string(),
        detail: "Quota exceeded (status 429): quotaExceeded".to_string(),
    });
    assert_eq!(halt.error_code(), "QUOTA_EXCEEDED");
    assert!(!halt.is_retryable());
    let message = halt.user_friendly_message();
    assert!(message.contains("channels.list statistics"));
    assert!(message.contains("run again"));

    ErrorReporter::default().report_error(&halt);
}

#[test]
fn test_storage_error_codes() {
    assert_eq!(StorageError::DatabaseLocked.error_code(), "DB_LOCKED");
    assert!(StorageError::DatabaseLocked.is_retryable());
    let migration = StorageError::MigrationFailed {
        migration: "0001_init".to_string(),
    };
    assert_eq!(migration.error_code(), "DB_MIGRATION_FAILED");
    assert!(!migration.is_retryable());
}
