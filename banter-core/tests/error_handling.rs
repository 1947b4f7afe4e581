use banter_core::{ConfigError, CoreError, DatabaseError, ErrorExt, PlatformApiError};
use std::time::Duration;

#[test]
fn test_error_codes() {
    let platform_error = CoreError::PlatformApi(PlatformApiError::InvalidToken);
    assert_eq!(platform_error.error_code(), "PLATFORM_API");

    let db_error = CoreError::Database(DatabaseError::ConnectionFailed {
        reason: "locked".to_string(),
    });
    assert_eq!(db_error.error_code(), "DATABASE");

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "bearer_token".to_string(),
    });
    assert_eq!(config_error.error_code(), "CONFIG");

    let input_error = CoreError::InvalidInput {
        message: "bad delay range".to_string(),
    };
    assert_eq!(input_error.error_code(), "INVALID_INPUT");
}

#[test]
fn test_retryable_errors() {
    let retryable = CoreError::PlatformApi(PlatformApiError::RateLimitExceeded { retry_after: 60 });
    assert!(retryable.is_retryable());

    let server_error = CoreError::PlatformApi(PlatformApiError::ServerError { status_code: 503 });
    assert!(server_error.is_retryable());

    let non_retryable = CoreError::Config(ConfigError::MissingField {
        field: "bearer_token".to_string(),
    });
    assert!(!non_retryable.is_retryable());

    let rejected = CoreError::PlatformApi(PlatformApiError::PublishRejected {
        reason: "duplicate content".to_string(),
    });
    assert!(!rejected.is_retryable());
}

#[test]
fn test_retry_after_durations() {
    let rate_limited =
        CoreError::PlatformApi(PlatformApiError::RateLimitExceeded { retry_after: 120 });
    assert_eq!(rate_limited.retry_after(), Some(Duration::from_secs(120)));

    let timeout = CoreError::Timeout { seconds: 30 };
    assert_eq!(timeout.retry_after(), Some(Duration::from_secs(30)));

    let forbidden = CoreError::PlatformApi(PlatformApiError::Forbidden {
        resource: "/2/tweets".to_string(),
    });
    assert_eq!(forbidden.retry_after(), None);
}

#[test]
fn test_user_friendly_messages() {
    let user_missing = CoreError::PlatformApi(PlatformApiError::UserNotFound {
        handle: "someuser".to_string(),
    });
    assert!(user_missing.user_friendly_message().contains("@someuser"));

    let rate_limited =
        CoreError::PlatformApi(PlatformApiError::RateLimitExceeded { retry_after: 60 });
    assert!(rate_limited.user_friendly_message().contains("60 seconds"));

    let env_missing = CoreError::Config(ConfigError::MissingEnvironmentVariable {
        var_name: "TWITTER_BEARER_TOKEN".to_string(),
    });
    assert!(env_missing
        .user_friendly_message()
        .contains("TWITTER_BEARER_TOKEN"));
}

#[test]
fn test_error_conversions() {
    let platform: CoreError = PlatformApiError::RequestTimeout.into();
    assert!(matches!(
        platform,
        CoreError::PlatformApi(PlatformApiError::RequestTimeout)
    ));

    let db: CoreError = DatabaseError::RecordNotFound {
        entity: "account".to_string(),
    }
    .into();
    assert!(matches!(db, CoreError::Database(_)));

    let io: CoreError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
    assert_eq!(io.error_code(), "IO");
}
