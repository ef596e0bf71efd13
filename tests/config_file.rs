//! The shipped configuration file must stay loadable and match the built-in defaults.

use sealguard::config::{OutputMode, SealGuardConfig};
use std::path::Path;
use std::time::Duration;

fn shipped() -> SealGuardConfig {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/sealguard.toml");
    let content = std::fs::read_to_string(path).unwrap();
    SealGuardConfig::from_toml_str(&content).unwrap()
}

#[test]
fn test_shipped_config_validates() {
    let config = shipped();
    assert!(config.validate().is_ok());
    assert_eq!(config.monitor.poll_interval, Duration::from_secs(1));
    assert_eq!(config.monitor.output, OutputMode::Text);
    assert_eq!(config.simulator.interval, Duration::from_millis(500));
    assert_eq!(config.training.cooling_bubbles, [10, 15]);
}

#[test]
fn test_shipped_config_matches_defaults() {
    let config = shipped();
    let defaults = SealGuardConfig::default();
    assert_eq!(config.guardrails.deadband, defaults.guardrails.deadband);
    assert_eq!(
        config.guardrails.min_cooling_bubbles,
        defaults.guardrails.min_cooling_bubbles
    );
    assert_eq!(config.history.capacity, defaults.history.capacity);
    assert_eq!(config.training.n_estimators, defaults.training.n_estimators);
    assert_eq!(config.bridge.baud_rate, defaults.bridge.baud_rate);
}

#[test]
fn test_negative_deadband_rejected() {
    let config = SealGuardConfig::from_toml_str("[guardrails]\ndeadband = -0.1\n").unwrap();
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("deadband"));
}
