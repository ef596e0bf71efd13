//! Deterministic override rules, evaluated before the anomaly model.
//!
//! Rule order is part of the contract:
//!
//! 1. **Heating**: `delta > deadband` is NORMAL whatever the bubble count.
//! 2. **Cooling without bubbles**: `delta < -deadband && bubbles < min_cooling_bubbles`
//!    is ANOMALY, whether or not a model is loaded.
//! 3. Anything else (the deadband, or cooling with enough bubbles) abstains.

use crate::config::GuardrailConfig;
use crate::decision::verdict::{AnomalyCause, NormalCause, Verdict};

/// Default half-width of the deadband around zero delta, in °C per tick.
pub const DEFAULT_DEADBAND: f64 = 0.05;

/// Default minimum bubble count for healthy cooling.
pub const DEFAULT_MIN_COOLING_BUBBLES: u32 = 5;

/// Hard override rules checked before any model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardrailEngine {
    deadband: f64,
    min_cooling_bubbles: u32,
}

impl Default for GuardrailEngine {
    fn default() -> Self {
        Self::new(DEFAULT_DEADBAND, DEFAULT_MIN_COOLING_BUBBLES)
    }
}

impl GuardrailEngine {
    /// Guardrails with an explicit deadband and bubble floor.
    pub fn new(deadband: f64, min_cooling_bubbles: u32) -> Self {
        Self {
            deadband,
            min_cooling_bubbles,
        }
    }

    /// Guardrails from the `[guardrails]` section.
    pub fn from_config(config: &GuardrailConfig) -> Self {
        Self::new(config.deadband, config.min_cooling_bubbles)
    }

    /// Returns a verdict only when a rule fires; `None` defers to the classifier.
    pub fn evaluate(&self, delta: f64, bubble_count: u32) -> Option<Verdict> {
        if delta > self.deadband {
            return Some(Verdict::Normal(NormalCause::Heating));
        }

        if delta < -self.deadband && bubble_count < self.min_cooling_bubbles {
            return Some(Verdict::Anomaly(AnomalyCause::CoolingWithoutBubbles));
        }

        None
    }

    /// Temperature change ignored in either direction, °C.
    pub fn deadband(&self) -> f64 {
        self.deadband
    }

    /// Cooling with fewer bubbles than this is a leak.
    pub fn min_cooling_bubbles(&self) -> u32 {
        self.min_cooling_bubbles
    }
}
