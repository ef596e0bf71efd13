//! Learned fallback for ticks the guardrails leave open.
//!
//! The model is trained only on healthy breathing, so its positive label means
//! "looks like the training distribution" and maps to NORMAL. Anything it
//! isolates as an outlier maps to ANOMALY.

use crate::decision::verdict::{AnomalyCause, NormalCause, Verdict};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Binary label returned by an [`AnomalyModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelLabel {
    /// Negative label (`-1`): outside the learned distribution.
    Outlier,
    /// Positive label (`+1`): inside the learned distribution.
    Inlier,
}

impl ModelLabel {
    /// Signed label as emitted by the trainer.
    pub fn as_i8(&self) -> i8 {
        match self {
            ModelLabel::Outlier => -1,
            ModelLabel::Inlier => 1,
        }
    }
}

/// A pre-trained two-feature binary outlier detector.
///
/// Implementations are loaded once and must not change for the life of the
/// process.
pub trait AnomalyModel: Send + Sync {
    /// Classify the feature vector `[delta_temperature, bubble_count]`.
    fn predict(&self, features: [f64; 2]) -> ModelLabel;

    /// Short description for logs and the presentation layer.
    fn describe(&self) -> String {
        "anomaly model".to_string()
    }
}

impl<T: AnomalyModel + ?Sized> AnomalyModel for Arc<T> {
    fn predict(&self, features: [f64; 2]) -> ModelLabel {
        (**self).predict(features)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Wraps a loaded [`AnomalyModel`] and maps its label onto a [`Verdict`].
pub struct AnomalyClassifier {
    model: Box<dyn AnomalyModel>,
}

impl AnomalyClassifier {
    /// Wrap a loaded model.
    pub fn new(model: impl AnomalyModel + 'static) -> Self {
        Self {
            model: Box::new(model),
        }
    }

    /// Inlier maps to NORMAL, outlier to ANOMALY.
    pub fn classify(&self, delta: f64, bubble_count: u32) -> Verdict {
        match self.model.predict([delta, f64::from(bubble_count)]) {
            ModelLabel::Inlier => Verdict::Normal(NormalCause::ModelInlier),
            ModelLabel::Outlier => Verdict::Anomaly(AnomalyCause::ModelOutlier),
        }
    }

    /// Description of the wrapped model.
    pub fn describe(&self) -> String {
        self.model.describe()
    }
}

impl fmt::Debug for AnomalyClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnomalyClassifier")
            .field("model", &self.model.describe())
            .finish()
    }
}
