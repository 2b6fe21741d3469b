use std::collections::HashMap;
use std::time::Duration;

use waypoint_core::config::{
    CoordinatorConfig, ENV_COMPLETE_RESPONSE_MS, ENV_INITIAL_RESPONSE_MS, ENV_MAX_CONCURRENCY,
};
use waypoint_core::models::CoreErrorKind;

#[test]
fn defaults_follow_the_design_values() {
    let config = CoordinatorConfig::default();
    assert_eq!(config.initial_response_time, Duration::from_secs(5));
    assert_eq!(config.complete_response_time, Duration::from_secs(30));
    assert_eq!(config.poll_interval, Duration::from_millis(100));
    assert_eq!(config.max_concurrency, None);
    config.validate().unwrap();
}

#[test]
fn complete_response_time_must_exceed_initial_response_time() {
    let config = CoordinatorConfig {
        initial_response_time: Duration::from_secs(5),
        complete_response_time: Duration::from_secs(5),
        ..CoordinatorConfig::default()
    };
    let error = config.validate().unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::InvalidConfig);
}

#[test]
fn zero_poll_interval_and_zero_concurrency_are_rejected() {
    let no_poll = CoordinatorConfig {
        poll_interval: Duration::ZERO,
        ..CoordinatorConfig::default()
    };
    assert!(no_poll.validate().is_err());

    let no_workers = CoordinatorConfig {
        max_concurrency: Some(0),
        ..CoordinatorConfig::default()
    };
    assert!(no_workers.validate().is_err());
}

#[test]
fn json_fields_overlay_defaults() {
    let config = CoordinatorConfig::from_json_str(
        r#"{ "initial_response_ms": 1500, "complete_response_ms": 9000, "max_concurrency": 2 }"#,
    )
    .unwrap();

    assert_eq!(config.initial_response_time, Duration::from_millis(1500));
    assert_eq!(config.complete_response_time, Duration::from_millis(9000));
    assert_eq!(config.max_concurrency, Some(2));
    assert_eq!(config.poll_interval, Duration::from_millis(100));
}

#[test]
fn unknown_json_fields_are_rejected() {
    let error = CoordinatorConfig::from_json_str(r#"{ "initial_response_seconds": 5 }"#)
        .unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::InvalidConfig);
}

#[test]
fn environment_overrides_replace_file_values() {
    let env = HashMap::from([
        (ENV_INITIAL_RESPONSE_MS, "250"),
        (ENV_COMPLETE_RESPONSE_MS, " 1000 "),
        (ENV_MAX_CONCURRENCY, ""),
    ]);
    let mut config = CoordinatorConfig::default();
    config
        .apply_overrides_from(|key| env.get(key).map(|value| value.to_string()))
        .unwrap();

    assert_eq!(config.initial_response_time, Duration::from_millis(250));
    assert_eq!(config.complete_response_time, Duration::from_secs(1));
    assert_eq!(config.max_concurrency, None);
}

#[test]
fn malformed_environment_override_is_an_invalid_config_error() {
    let mut config = CoordinatorConfig::default();
    let error = config
        .apply_overrides_from(|key| (key == ENV_INITIAL_RESPONSE_MS).then(|| "soon".to_string()))
        .unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::InvalidConfig);
    assert!(error.message.contains(ENV_INITIAL_RESPONSE_MS));
}
