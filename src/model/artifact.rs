//! Model artifact persistence.
//!
//! The forest is stored as pretty-printed JSON. Loading validates the arena
//! structure so a hand-edited or truncated file is rejected up front instead
//! of misbehaving on the first prediction.

use crate::decision::classifier::AnomalyClassifier;
use crate::model::isolation_forest::IsolationForest;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

/// Model artifact and fitting failures.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No file at the configured path.
    #[error("model artifact not found at {path}")]
    NotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// File exists but could not be read or written.
    #[error("failed to access model artifact {path}: {source}")]
    Io {
        /// Artifact path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Contents are not a forest artifact.
    #[error("model artifact {path} is not valid JSON: {source}")]
    Format {
        /// Artifact path.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// Artifact written by an incompatible version.
    #[error("unsupported model format version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version in the file.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },

    /// Structural validation failed.
    #[error("corrupt model artifact: {0}")]
    Corrupt(String),

    /// Too few rows to fit.
    #[error("need at least 2 training rows, got {rows}")]
    InsufficientData {
        /// Rows provided.
        rows: usize,
    },

    /// Hyperparameter out of range.
    #[error("invalid forest parameter: {0}")]
    InvalidParameter(String),
}

/// Write `forest` to `path`.
pub fn save_model(path: &Path, forest: &IsolationForest) -> Result<(), ModelError> {
    let json = serde_json::to_vec_pretty(forest).map_err(|source| ModelError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), trees = forest.n_trees(), "Model artifact saved");
    Ok(())
}

/// Read and validate a forest from `path`.
pub fn load_model(path: &Path) -> Result<IsolationForest, ModelError> {
    let bytes = std::fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => ModelError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ModelError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let forest: IsolationForest =
        serde_json::from_slice(&bytes).map_err(|source| ModelError::Format {
            path: path.to_path_buf(),
            source,
        })?;
    forest.validate()?;
    Ok(forest)
}

/// Load the classifier for the monitor.
///
/// A missing artifact is a normal deployment state: the monitor runs on the
/// guardrails alone. A present but unusable artifact is logged as an error
/// and treated the same way.
pub fn load_classifier(path: &Path) -> Option<AnomalyClassifier> {
    match load_model(path) {
        Ok(forest) => {
            let classifier = AnomalyClassifier::new(forest);
            info!(path = %path.display(), model = %classifier.describe(), "Anomaly model loaded");
            Some(classifier)
        }
        Err(ModelError::NotFound { .. }) => {
            info!(
                path = %path.display(),
                "No anomaly model found; running on guardrails only"
            );
            None
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to load anomaly model");
            None
        }
    }
}
