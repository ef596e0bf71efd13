//! One-step temperature trend.

use crate::telemetry::TelemetryReading;

/// Seed used when the configuration does not provide one.
pub const DEFAULT_SEED_TEMPERATURE: f64 = 50.0;

/// Carried state of the decision engine.
///
/// `previous_temperature` starts at a configured seed, not a sensor value, so the
/// first delta measures distance from that seed rather than a real rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionState {
    /// Temperature of the last successfully processed reading.
    pub previous_temperature: f64,
    /// Number of successfully processed ticks since start.
    pub tick_counter: u64,
}

impl DecisionState {
    /// Fresh state seeded with `seed_temperature`.
    pub fn new(seed_temperature: f64) -> Self {
        Self {
            previous_temperature: seed_temperature,
            tick_counter: 0,
        }
    }
}

impl Default for DecisionState {
    fn default() -> Self {
        Self::new(DEFAULT_SEED_TEMPERATURE)
    }
}

/// Computes `delta = reading.temperature - previous_temperature` and rolls the
/// stored temperature forward.
#[derive(Debug, Clone, Default)]
pub struct TrendTracker {
    state: DecisionState,
}

impl TrendTracker {
    /// Tracker whose first delta is measured against `seed_temperature`.
    pub fn new(seed_temperature: f64) -> Self {
        Self {
            state: DecisionState::new(seed_temperature),
        }
    }

    /// Yield the delta for `reading` and remember its temperature.
    pub fn update(&mut self, reading: &TelemetryReading) -> f64 {
        let delta = reading.temperature - self.state.previous_temperature;
        self.state.previous_temperature = reading.temperature;
        delta
    }

    /// Advance and return the tick counter.
    pub(crate) fn next_tick(&mut self) -> u64 {
        self.state.tick_counter += 1;
        self.state.tick_counter
    }

    /// Current carried state.
    pub fn state(&self) -> &DecisionState {
        &self.state
    }
}
