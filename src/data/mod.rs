//! Data handling: the display history and the classifier's training set.

pub mod history;
pub mod training;

pub use history::{HistoryBuffer, HistoryEntry};
pub use training::{generate_healthy_samples, TrainingSample};
