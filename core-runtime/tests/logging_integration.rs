//! Integration tests for logging system

use bridge_traits::log::LogLevel;
use core_runtime::logging::{
    init_logging, redact_headers, redact_if_sensitive, LogFormat, LoggingConfig,
};
use std::collections::HashMap;

#[test]
fn test_builder_overrides_every_default() {
    let defaults = LoggingConfig::default();
    assert_eq!(defaults.level, LogLevel::Info);
    assert!(defaults.redact_pii && defaults.display_target);
    assert!(!defaults.enable_spans && !defaults.display_thread_info);

    let tuned = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_pii_redaction(false)
        .with_spans(true)
        .with_target(false)
        .with_thread_info(true)
        .with_filter("core_playback::poller=trace");

    assert_eq!(
        (tuned.format, tuned.level),
        (LogFormat::Compact, LogLevel::Warn)
    );
    assert!(!tuned.redact_pii && !tuned.display_target);
    assert!(tuned.enable_spans && tuned.display_thread_info);
    assert_eq!(tuned.filter.as_deref(), Some("core_playback::poller=trace"));
}

#[test]
fn test_debug_output_hides_sink() {
    let rendered = format!("{:?}", LoggingConfig::default().with_level(LogLevel::Debug));
    assert!(rendered.contains("Debug"));
    assert!(rendered.contains("logger_sink: \"none\""));
}

#[test]
fn test_header_credentials_are_redacted() {
    assert_eq!(redact_if_sensitive("X-Api-Key", "k-123"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("Set-Cookie", "a=b"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("access_token", "t"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("Range", "bytes=0-"), "bytes=0-");

    let mut headers = HashMap::new();
    headers.insert("Authorization".to_string(), "Bearer abc".to_string());
    headers.insert("Accept".to_string(), "audio/*".to_string());

    let logged = format!("{:?}", redact_headers(&headers));
    assert!(!logged.contains("Bearer abc"));
    assert!(logged.contains("audio/*"));
}

#[test]
fn test_init_logging_only_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn);

    // The first call in this test binary installs the global subscriber.
    assert!(init_logging(config.clone()).is_ok());
    assert!(init_logging(config).is_err());
}

#[test]
fn test_default_format_follows_build_profile() {
    let expected = if cfg!(debug_assertions) {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    };
    assert_eq!(LogFormat::default(), expected);
}
