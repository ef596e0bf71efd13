//! Custom error types for the application.
//!
//! `SealGuardError` is the crate-wide error. Module-level errors (`ParseError`,
//! `ModelError`, `SourceError`) convert into it with `#[from]`, so library code
//! can use `?` throughout while the decision core keeps its narrow error types.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: figment failed to read or deserialize the configuration.
//! - **`Configuration`**: the configuration parsed but is semantically invalid.
//! - **`Io`**: file and channel I/O.
//! - **`Parse`**: a malformed telemetry record. Non-fatal for the monitor loop.
//! - **`Model`**: the anomaly model artifact could not be loaded or saved.
//! - **`Source`**: a telemetry source failed in a way other than "not there yet".
//! - **`Storage`**: reading or writing the training CSV failed.
//! - **`Serial`**: the serial bridge could not open or read its port.
//! - **`FeatureNotEnabled`**: the operation needs a cargo feature that was compiled out.

use crate::model::ModelError;
use crate::source::SourceError;
use crate::telemetry::ParseError;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, SealGuardError>;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum SealGuardError {
    /// Figment could not read or deserialize the configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration loaded but failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// File or channel I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed telemetry record.
    #[error("Telemetry parse error: {0}")]
    Parse(#[from] ParseError),

    /// Model artifact load, save or fit failure.
    #[error("Anomaly model error: {0}")]
    Model(#[from] ModelError),

    /// Telemetry source or sink failure.
    #[error("Telemetry source error: {0}")]
    Source(#[from] SourceError),

    /// Training CSV could not be written or read back.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serial port open or read failure.
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Operation needs a cargo feature that was compiled out.
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl From<figment::Error> for SealGuardError {
    fn from(value: figment::Error) -> Self {
        SealGuardError::Config(Box::new(value))
    }
}
