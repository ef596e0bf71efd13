//! Anomaly model: the isolation forest and its on-disk artifact.

pub mod artifact;
pub mod isolation_forest;

pub use artifact::{load_classifier, load_model, save_model, ModelError};
pub use isolation_forest::{ForestParams, IsolationForest};
