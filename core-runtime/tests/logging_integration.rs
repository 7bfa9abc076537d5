//! Integration tests for logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_path, LogFormat, LoggingConfig,
};

#[test]
fn test_init_logging_only_once() {
    // The global subscriber can be installed once per process
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    assert!(init_logging(config.clone()).is_ok());
    tracing::info!(file = "IMG_0001.JPG", "logging initialised");

    let second = init_logging(config);
    assert!(second.is_err());
}

#[test]
fn test_invalid_filter_is_rejected_before_install() {
    let config = LoggingConfig::default().with_filter("core_sync=notalevel");
    let err = init_logging(config).unwrap_err();
    assert!(err.to_string().contains("Invalid log filter"));
}

#[test]
fn test_credential_redaction() {
    assert_eq!(redact_if_sensitive("password", "hunter2"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("share_password", "hunter2"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("auth_token", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("client_secret", "abc"), "[REDACTED]");
}

#[test]
fn test_normal_values_pass_through() {
    assert_eq!(redact_if_sensitive("file", "IMG_0001.JPG"), "IMG_0001.JPG");
    assert_eq!(redact_if_sensitive("server", "192.168.1.20"), "192.168.1.20");
    assert_eq!(redact_if_sensitive("bytes", "1048576"), "1048576");
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/run/media/alice/CAM/DCIM/Camera01/IMG_0001.JPG"), "IMG_0001.JPG");
    assert_eq!(strip_path("F:\\DCIM\\Camera01\\MOV_0002.MP4"), "MOV_0002.MP4");
    assert_eq!(strip_path("IMG_0003.JPG"), "IMG_0003.JPG");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_from_env_reads_filter_and_format() {
    std::env::set_var("CAMSYNC_LOG", "core_sync=trace");
    std::env::set_var("CAMSYNC_LOG_FORMAT", "compact");
    let config = LoggingConfig::from_env();
    std::env::remove_var("CAMSYNC_LOG");
    std::env::remove_var("CAMSYNC_LOG_FORMAT");

    assert_eq!(config.filter.as_deref(), Some("core_sync=trace"));
    assert_eq!(config.format, LogFormat::Compact);
    assert!(config.redact_secrets);
    assert!(config.strip_paths);
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_secret_redaction(false)
        .with_filter("core_sync=trace,bridge_desktop=debug")
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.redact_secrets);
    assert_eq!(
        config.filter.as_deref(),
        Some("core_sync=trace,bridge_desktop=debug")
    );
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}
