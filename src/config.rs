//! Configuration System using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (`config/sealguard.toml` by default)
//! 2. Environment variables prefixed with `SEALGUARD_`, with `__` separating
//!    the section from the key
//!
//! Every field has a default, so a missing file still produces a working
//! configuration.
//!
//! # Example
//! ```no_run
//! use sealguard::config::SealGuardConfig;
//!
//! // SEALGUARD_MONITOR__POLL_INTERVAL=500ms overrides [monitor] poll_interval
//! let config = SealGuardConfig::load()?;
//! config.validate()?;
//! println!("Polling {} every {:?}", config.monitor.telemetry_path.display(), config.monitor.poll_interval);
//! # Ok::<(), sealguard::error::SealGuardError>(())
//! ```

use crate::data::history::{DEFAULT_DISPLAY_THRESHOLD, DEFAULT_HISTORY_CAPACITY};
use crate::decision::guardrail::{DEFAULT_DEADBAND, DEFAULT_MIN_COOLING_BUBBLES};
use crate::decision::trend::DEFAULT_SEED_TEMPERATURE;
use crate::error::{AppResult, SealGuardError};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/sealguard.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SEALGUARD_";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SealGuardConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Tick loop settings
    pub monitor: MonitorConfig,
    /// Guardrail thresholds
    pub guardrails: GuardrailConfig,
    /// Rolling history settings
    pub history: HistoryConfig,
    /// Simulated producer
    pub simulator: SimulatorConfig,
    /// Synthetic data generation and model training
    pub training: TrainingConfig,
    /// Raw serial bridge
    pub bridge: BridgeConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "SealGuard".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// How the monitor publishes each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Human-readable banner and metrics
    Text,
    /// One JSON object per tick
    Json,
}

/// Tick loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// File the producer overwrites with the latest record
    pub telemetry_path: PathBuf,
    /// Serialized anomaly model
    pub model_path: PathBuf,
    /// Interval between ticks
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Baseline for the first delta
    pub seed_temperature: f64,
    /// Stop after this many ticks (runs until Ctrl-C when unset)
    pub max_ticks: Option<u64>,
    /// Publication format
    pub output: OutputMode,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            telemetry_path: PathBuf::from("esp_data.txt"),
            model_path: PathBuf::from("sealguard_model.json"),
            poll_interval: Duration::from_secs(1),
            seed_temperature: DEFAULT_SEED_TEMPERATURE,
            max_ticks: None,
            output: OutputMode::Text,
        }
    }
}

/// Guardrail thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    /// Half-width of the no-decision band around zero delta
    pub deadband: f64,
    /// Cooling with fewer bubbles than this is a leak
    pub min_cooling_bubbles: u32,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            deadband: DEFAULT_DEADBAND,
            min_cooling_bubbles: DEFAULT_MIN_COOLING_BUBBLES,
        }
    }
}

/// Rolling history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum entries kept
    pub capacity: usize,
    /// Alarm line drawn on the temperature chart
    pub display_threshold: f64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAPACITY,
            display_threshold: DEFAULT_DISPLAY_THRESHOLD,
        }
    }
}

/// Simulated ESP32 producer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Lower turning point, °C
    pub min_temp: f64,
    /// Upper turning point, °C
    pub max_temp: f64,
    /// Initial temperature, °C
    pub start_temp: f64,
    /// °C added per step while heating
    pub heating_rate: f64,
    /// °C removed per step while cooling
    pub cooling_rate: f64,
    /// Uniform noise half-width per step
    pub noise: f64,
    /// Inclusive bubble range while cooling on a healthy cycle
    pub healthy_bubbles: [u32; 2],
    /// Inclusive bubble range while cooling on a leaking cycle
    pub leak_bubbles: [u32; 2],
    /// First cycle (1-based) that leaks
    pub leak_from_cycle: u32,
    /// Write interval
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// RNG seed; entropy when unset
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            min_temp: 45.0,
            max_temp: 85.0,
            start_temp: 50.0,
            heating_rate: 0.3,
            cooling_rate: 0.2,
            noise: 0.02,
            healthy_bubbles: [10, 15],
            leak_bubbles: [0, 2],
            leak_from_cycle: 2,
            interval: Duration::from_millis(500),
            seed: None,
        }
    }
}

/// Synthetic training data and isolation forest hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of simulated ticks
    pub steps: usize,
    /// Lower turning point, °C
    pub min_temp: f64,
    /// Upper turning point, °C
    pub max_temp: f64,
    /// Initial temperature, °C
    pub start_temp: f64,
    /// Doubled relative to the simulator: the monitor samples every second
    /// while the producer writes every half second.
    pub heating_rate: f64,
    /// °C removed per step while cooling
    pub cooling_rate: f64,
    /// Uniform noise half-width per step
    pub noise: f64,
    /// Inclusive bubble range while cooling
    pub cooling_bubbles: [u32; 2],
    /// Number of isolation trees
    pub n_estimators: usize,
    /// Expected outlier fraction in the training data
    pub contamination: f64,
    /// Subsample size per tree (capped at the row count)
    pub max_samples: usize,
    /// RNG seed for generation and fitting
    pub seed: u64,
    /// CSV exchanged between the generator and the trainer
    pub data_path: PathBuf,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            steps: 50_000,
            min_temp: 45.0,
            max_temp: 85.0,
            start_temp: 50.0,
            heating_rate: 0.6,
            cooling_rate: 0.4,
            noise: 0.05,
            cooling_bubbles: [10, 15],
            n_estimators: 200,
            contamination: 0.001,
            max_samples: 256,
            seed: 42,
            data_path: PathBuf::from("transformer_healthy_data.csv"),
        }
    }
}

/// Raw ESP32 serial bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Serial device, e.g. `/dev/ttyUSB0`
    pub port: String,
    /// Line speed
    pub baud_rate: u32,
    /// Temperature change needed to switch phase
    pub phase_threshold: f64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            phase_threshold: 0.1,
        }
    }
}

impl SealGuardConfig {
    /// Load from the default path and environment.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file path, then apply environment overrides.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Parse from a TOML string without consulting the environment.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let config = Figment::new().merge(Toml::string(content)).extract()?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> AppResult<()> {
        let invalid = |msg: String| Err(SealGuardError::Configuration(msg));

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return invalid(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.to_lowercase().as_str()) {
            return invalid(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            ));
        }

        if self.guardrails.deadband.is_nan() || self.guardrails.deadband < 0.0 {
            return invalid(format!(
                "Invalid guardrail deadband {} (must be >= 0)",
                self.guardrails.deadband
            ));
        }

        if self.history.capacity == 0 {
            return invalid("History capacity must be greater than 0".to_string());
        }

        if self.monitor.poll_interval.is_zero() {
            return invalid("Monitor poll_interval must be greater than 0".to_string());
        }

        let sim = &self.simulator;
        check_sweep(
            "simulator",
            sim.min_temp,
            sim.max_temp,
            sim.heating_rate,
            sim.cooling_rate,
            sim.noise,
        )?;
        check_range("simulator.healthy_bubbles", sim.healthy_bubbles)?;
        check_range("simulator.leak_bubbles", sim.leak_bubbles)?;

        let train = &self.training;
        check_sweep(
            "training",
            train.min_temp,
            train.max_temp,
            train.heating_rate,
            train.cooling_rate,
            train.noise,
        )?;
        check_range("training.cooling_bubbles", train.cooling_bubbles)?;

        if train.contamination.is_nan() || train.contamination <= 0.0 || train.contamination > 0.5 {
            return invalid(format!(
                "Invalid contamination {}. Must be in (0, 0.5]",
                train.contamination
            ));
        }

        if train.n_estimators == 0 {
            return invalid("n_estimators must be greater than 0".to_string());
        }

        if train.max_samples < 2 {
            return invalid(format!(
                "Invalid max_samples {}. Must be at least 2",
                train.max_samples
            ));
        }

        Ok(())
    }
}

fn check_sweep(
    section: &str,
    min: f64,
    max: f64,
    heating: f64,
    cooling: f64,
    noise: f64,
) -> AppResult<()> {
    if !min.is_finite() || !max.is_finite() || min >= max {
        return Err(SealGuardError::Configuration(format!(
            "Invalid {section} temperature bounds: min ({min}) must be less than max ({max})"
        )));
    }
    if heating.is_nan() || cooling.is_nan() || heating <= 0.0 || cooling <= 0.0 {
        return Err(SealGuardError::Configuration(format!(
            "Invalid {section} rates: heating ({heating}) and cooling ({cooling}) must be > 0"
        )));
    }
    if noise.is_nan() || noise < 0.0 {
        return Err(SealGuardError::Configuration(format!(
            "Invalid {section} noise {noise} (must be >= 0)"
        )));
    }
    Ok(())
}

fn check_range(name: &str, range: [u32; 2]) -> AppResult<()> {
    if range[0] > range[1] {
        return Err(SealGuardError::Configuration(format!(
            "Invalid {name}: [{}, {}] is inverted",
            range[0], range[1]
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = SealGuardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.monitor.seed_temperature, 50.0);
        assert_eq!(config.guardrails.deadband, 0.05);
        assert_eq!(config.guardrails.min_cooling_bubbles, 5);
        assert_eq!(config.history.capacity, 100);
        assert_eq!(config.training.n_estimators, 200);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = SealGuardConfig::from_toml_str(
            r#"
            [monitor]
            poll_interval = "250ms"
            output = "json"

            [guardrails]
            deadband = 0.1
            "#,
        )
        .unwrap();

        assert_eq!(config.monitor.poll_interval, Duration::from_millis(250));
        assert_eq!(config.monitor.output, OutputMode::Json);
        assert_eq!(config.guardrails.deadband, 0.1);
        assert_eq!(config.guardrails.min_cooling_bubbles, 5);
        assert_eq!(config.application.log_level, "info");
    }

    #[test]
    fn invalid_log_level() {
        let mut config = SealGuardConfig::default();
        config.application.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_bubble_range() {
        let mut config = SealGuardConfig::default();
        config.simulator.leak_bubbles = [3, 1];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("leak_bubbles"));
    }

    #[test]
    fn contamination_out_of_range() {
        let mut config = SealGuardConfig::default();
        config.training.contamination = 0.0;
        assert!(config.validate().is_err());
        config.training.contamination = 0.6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_sweep_bounds() {
        let mut config = SealGuardConfig::default();
        config.training.min_temp = 90.0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn missing_file_uses_defaults() {
        let config = SealGuardConfig::load_from("does/not/exist.toml").unwrap();
        assert_eq!(config.monitor.telemetry_path, PathBuf::from("esp_data.txt"));
    }

    #[test]
    #[serial]
    fn environment_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[monitor]\nseed_temperature = 40.0\nmax_ticks = 10").unwrap();

        std::env::set_var("SEALGUARD_MONITOR__SEED_TEMPERATURE", "61.5");
        let result = SealGuardConfig::load_from(file.path());
        std::env::remove_var("SEALGUARD_MONITOR__SEED_TEMPERATURE");

        let config = result.unwrap();
        assert_eq!(config.monitor.seed_temperature, 61.5);
        assert_eq!(config.monitor.max_ticks, Some(10));
    }
}
