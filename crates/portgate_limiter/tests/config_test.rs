//! Tests for limiter configuration loading and validation.

use portgate_error::PortgateErrorKind;
use portgate_limiter::{LimiterConfig, PortgateConfig};
use std::time::Duration;

#[test]
fn test_defaults_match_documented_values() {
    let limits = LimiterConfig::default();
    assert_eq!(*limits.max_attempts(), 42);
    assert_eq!(*limits.max_repeat_attempts(), 6);
    assert_eq!(*limits.check_delay_ms(), 1200);
    assert_eq!(*limits.max_one_time_req(), 6);
    assert_eq!(limits.client_field_name(), "client");
    assert_eq!(limits.cache().std_ttl(), None);
    assert!(limits.validate().is_ok());
}

#[test]
fn test_derived_durations() {
    let limits = LimiterConfig::builder()
        .max_attempts(10)
        .max_repeat_attempts(4)
        .check_delay_ms(250)
        .build()
        .unwrap();

    assert_eq!(limits.check_delay(), Duration::from_millis(250));
    assert_eq!(limits.retry_starting_attempt(), 6);
    assert_eq!(limits.max_admission_wait(), Some(Duration::from_millis(2500)));
}

#[test]
fn test_builder_fills_unset_fields_with_defaults() {
    let limits = LimiterConfig::builder().max_one_time_req(2).build().unwrap();
    assert_eq!(*limits.max_one_time_req(), 2);
    assert_eq!(*limits.max_attempts(), 42);
}

#[test]
fn test_validate_rejects_out_of_range_limits() {
    let zero_attempts = LimiterConfig::default().with_max_attempts(0);
    assert!(zero_attempts.validate().is_err());

    let repeat_too_large = LimiterConfig::default()
        .with_max_attempts(5)
        .with_max_repeat_attempts(6);
    let err = repeat_too_large.validate().unwrap_err();
    assert!(matches!(err.kind(), PortgateErrorKind::Builder(_)));
    assert!(err.to_string().contains("max_repeat_attempts"));

    let zero_slots = LimiterConfig::default().with_max_one_time_req(0);
    assert!(zero_slots.validate().is_err());

    let no_field = LimiterConfig::default().with_client_field_name(String::new());
    assert!(no_field.validate().is_err());
}

#[test]
fn test_validate_accepts_boundary_values() {
    let limits = LimiterConfig::default()
        .with_max_attempts(1)
        .with_max_repeat_attempts(1)
        .with_check_delay_ms(0)
        .with_max_one_time_req(1);
    assert!(limits.validate().is_ok());
    assert_eq!(limits.retry_starting_attempt(), 0);
}

#[test]
fn test_load_bundled_defaults() {
    let config = PortgateConfig::load().unwrap();
    assert!(config.validate().is_ok());

    let limits = config.for_instance("anything");
    assert!(*limits.max_attempts() > 0);
    assert!(*limits.max_one_time_req() > 0);
}

#[test]
fn test_config_from_file() {
    use std::io::Write;
    use tempfile::Builder;

    let mut temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        temp_file,
        r#"
[limiter]
max_attempts = 10
check_delay_ms = 50

[limiter.cache]
std_ttl_secs = 3600

[instances.drive]
max_one_time_req = 2
client_field_name = "drive"
"#
    )
    .unwrap();

    let config = PortgateConfig::from_file(temp_file.path()).unwrap();

    let shared = config.for_instance("gmail");
    assert_eq!(*shared.max_attempts(), 10);
    assert_eq!(*shared.check_delay_ms(), 50);
    assert_eq!(*shared.max_one_time_req(), 6);
    assert_eq!(shared.cache().std_ttl(), Some(Duration::from_secs(3600)));

    let drive = config.for_instance("drive");
    assert_eq!(*drive.max_one_time_req(), 2);
    assert_eq!(drive.client_field_name(), "drive");
    assert_eq!(*drive.max_attempts(), 42);
}

#[test]
fn test_validate_reports_bad_instance() {
    use std::io::Write;
    use tempfile::Builder;

    let mut temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        temp_file,
        r#"
[instances.broken]
max_attempts = 2
max_repeat_attempts = 3
"#
    )
    .unwrap();

    let config = PortgateConfig::from_file(temp_file.path()).unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("broken"));
}

#[test]
fn test_missing_file_is_config_error() {
    let err = PortgateConfig::from_file("/definitely/not/here/portgate.toml").unwrap_err();
    match err.kind() {
        PortgateErrorKind::Config(config) => {
            assert!(
                config
                    .message
                    .starts_with("/definitely/not/here/portgate.toml: ")
            );
        }
        other => panic!("unexpected kind: {:?}", other),
    }
}

#[test]
fn test_admission_wait_overflow_is_none() {
    let limits = LimiterConfig::default()
        .with_check_delay_ms(u64::MAX)
        .with_max_attempts(2);
    assert_eq!(limits.max_admission_wait(), None);
    assert_eq!(limits.check_delay(), Duration::from_millis(u64::MAX));
}
