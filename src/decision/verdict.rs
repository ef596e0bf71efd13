//! Verdicts produced once per tick.
//!
//! A [`Verdict`] is a closed enum. The cause that produced it travels with it,
//! and both the banner [`Severity`] and the operator message are derived from
//! that cause. Nothing downstream inspects message text to decide how to render.

use serde::{Serialize, Serializer};
use std::fmt;

/// Banner severity for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Neutral banner (initialising, waiting, skipped tick).
    Info,
    /// Healthy breathing.
    Success,
    /// Leak detected.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Success => write!(f, "SUCCESS"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Discriminant of a [`Verdict`], without its cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictKind {
    /// No call made.
    Waiting,
    /// Healthy breathing.
    Normal,
    /// Leak suspected.
    Anomaly,
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictKind::Waiting => write!(f, "WAITING"),
            VerdictKind::Normal => write!(f, "NORMAL"),
            VerdictKind::Anomaly => write!(f, "ANOMALY"),
        }
    }
}

/// Why the engine could not commit to NORMAL or ANOMALY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitReason {
    /// No reading has been processed yet.
    Initializing,
    /// The telemetry source has no record yet.
    SourceUnavailable,
    /// Guardrails abstained and no anomaly model is loaded.
    ModelUnavailable,
}

/// Why the engine called the breathing cycle healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormalCause {
    /// Heating guardrail fired.
    Heating,
    /// Anomaly model classified the sample as in-distribution.
    ModelInlier,
}

/// Why the engine raised a leak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnomalyCause {
    /// Cooling with too few bubbles: the hard safety floor.
    CoolingWithoutBubbles,
    /// Anomaly model flagged the sample as an outlier.
    ModelOutlier,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// No call made this tick.
    Waiting(WaitReason),
    /// Healthy breathing.
    Normal(NormalCause),
    /// Leak suspected.
    Anomaly(AnomalyCause),
}

impl Verdict {
    /// Discriminant without the cause.
    pub fn kind(&self) -> VerdictKind {
        match self {
            Verdict::Waiting(_) => VerdictKind::Waiting,
            Verdict::Normal(_) => VerdictKind::Normal,
            Verdict::Anomaly(_) => VerdictKind::Anomaly,
        }
    }

    /// Banner severity.
    pub fn severity(&self) -> Severity {
        match self {
            Verdict::Waiting(_) => Severity::Info,
            Verdict::Normal(_) => Severity::Success,
            Verdict::Anomaly(_) => Severity::Error,
        }
    }

    /// Operator-facing status line.
    pub fn message(&self) -> &'static str {
        match self {
            Verdict::Waiting(WaitReason::Initializing) => "System Initializing...",
            Verdict::Waiting(WaitReason::SourceUnavailable) => "Waiting for ESP32 Signal...",
            Verdict::Waiting(WaitReason::ModelUnavailable) => {
                "Awaiting Classifier (anomaly model not loaded)"
            }
            Verdict::Normal(NormalCause::Heating) => "System Heating (Normal)",
            Verdict::Normal(NormalCause::ModelInlier) => "System Breathing Normally",
            Verdict::Anomaly(_) => "LEAK DETECTED: Cooling without Bubbles",
        }
    }

    /// Whether a guardrail rule, rather than the model, decided this verdict.
    pub fn is_guardrail(&self) -> bool {
        matches!(
            self,
            Verdict::Normal(NormalCause::Heating)
                | Verdict::Anomaly(AnomalyCause::CoolingWithoutBubbles)
        )
    }

    /// Shorthand for `kind() == VerdictKind::Anomaly`.
    pub fn is_anomaly(&self) -> bool {
        matches!(self, Verdict::Anomaly(_))
    }
}

impl Default for Verdict {
    fn default() -> Self {
        Verdict::Waiting(WaitReason::Initializing)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl Serialize for Verdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.kind().serialize(serializer)
    }
}
