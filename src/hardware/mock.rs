//! Simulated Breathing Hardware
//!
//! Stands in for the ESP32 on the transformer conservator when no board is
//! attached. The oil temperature sweeps between two bounds; cooling draws a
//! healthy bubble count through the seal until the configured leak cycle,
//! after which the seal fails and cooling yields almost no bubbles.
//!
//! # Available Mocks
//!
//! - `ThermalSweep` - the bare temperature ramp, shared with the training data generator
//! - `MockBreather` - full telemetry producer built on the sweep
//!
//! # Performance Characteristics
//!
//! - Default sweep: 45-85 °C, +0.3 °C/step heating, -0.2 °C/step cooling, ±0.02 °C noise
//! - Default cadence: one record every 500 ms (twice the monitor's poll rate)

use crate::config::SimulatorConfig;
use crate::error::AppResult;
use crate::source::TelemetrySink;
use crate::telemetry::{Phase, TelemetryReading};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

// =============================================================================
// ThermalSweep - Temperature Ramp
// =============================================================================

/// One step of a [`ThermalSweep`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepStep {
    /// Phase the step was taken in (decided before any direction flip).
    pub phase: Phase,
    /// Temperature before the step.
    pub previous: f64,
    /// Temperature after the step.
    pub temperature: f64,
    /// Cycle counter after any direction flip.
    pub cycle: u32,
}

impl SweepStep {
    /// Temperature change over this step.
    pub fn delta(&self) -> f64 {
        self.temperature - self.previous
    }
}

/// Triangular temperature ramp with bounded uniform noise.
///
/// Heating adds `heating_rate + noise`; cooling removes `cooling_rate + noise`.
/// Reaching `max` turns the ramp to cooling, reaching `min` turns it back to
/// heating and starts a new cycle.
#[derive(Debug, Clone)]
pub struct ThermalSweep {
    temperature: f64,
    heating: bool,
    cycle: u32,
    min: f64,
    max: f64,
    heating_rate: f64,
    cooling_rate: f64,
    noise: f64,
}

impl ThermalSweep {
    /// Sweep starting at `start`, heating, on cycle 1.
    pub fn new(
        start: f64,
        min: f64,
        max: f64,
        heating_rate: f64,
        cooling_rate: f64,
        noise: f64,
    ) -> Self {
        Self {
            temperature: start,
            heating: true,
            cycle: 1,
            min,
            max,
            heating_rate,
            cooling_rate,
            noise: noise.abs(),
        }
    }

    /// Advance one step.
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> SweepStep {
        let previous = self.temperature;
        let noise = if self.noise > 0.0 {
            rng.gen_range(-self.noise..=self.noise)
        } else {
            0.0
        };

        let phase = if self.heating {
            self.temperature += self.heating_rate + noise;
            Phase::Heating
        } else {
            self.temperature -= self.cooling_rate + noise;
            Phase::Cooling
        };

        if self.temperature >= self.max {
            self.heating = false;
        } else if self.temperature <= self.min && !self.heating {
            self.heating = true;
            self.cycle += 1;
        }

        SweepStep {
            phase,
            previous,
            temperature: self.temperature,
            cycle: self.cycle,
        }
    }

    /// Current temperature.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Current cycle, starting at 1.
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    /// Whether the next step heats.
    pub fn is_heating(&self) -> bool {
        self.heating
    }
}

// =============================================================================
// MockBreather - Simulated ESP32 Producer
// =============================================================================

/// Simulated conservator sensor board.
///
/// Healthy cycles bubble `healthy_bubbles` while cooling. From
/// `leak_from_cycle` onward cooling only yields `leak_bubbles`, which is the
/// signature the cooling guardrail is built to catch.
///
/// # Example
///
/// ```rust,ignore
/// let mut breather = MockBreather::from_config(&SimulatorConfig::default());
/// let reading = breather.next_reading();
/// assert_eq!(reading.phase, Phase::Heating);
/// ```
pub struct MockBreather {
    sweep: ThermalSweep,
    healthy_bubbles: [u32; 2],
    leak_bubbles: [u32; 2],
    leak_from_cycle: u32,
    rng: StdRng,
    interval: Duration,
}

impl MockBreather {
    /// Build from simulator configuration. Uses OS entropy when no seed is set.
    pub fn from_config(config: &SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            sweep: ThermalSweep::new(
                config.start_temp,
                config.min_temp,
                config.max_temp,
                config.heating_rate,
                config.cooling_rate,
                config.noise,
            ),
            healthy_bubbles: config.healthy_bubbles,
            leak_bubbles: config.leak_bubbles,
            leak_from_cycle: config.leak_from_cycle,
            rng,
            interval: config.interval,
        }
    }

    /// Produce the next sample.
    pub fn next_reading(&mut self) -> TelemetryReading {
        let step = self.sweep.step(&mut self.rng);

        let (bubbles, status) = match step.phase {
            Phase::Cooling if step.cycle < self.leak_from_cycle => {
                (draw(&mut self.rng, self.healthy_bubbles), "HEALTHY")
            }
            Phase::Cooling => (draw(&mut self.rng, self.leak_bubbles), "LEAK"),
            _ => (0, "HEALTHY"),
        };

        TelemetryReading::new(step.temperature, bubbles, step.phase).with_status(status)
    }

    /// Whether the seal is failed on the current cycle.
    pub fn is_leaking(&self) -> bool {
        self.sweep.cycle() >= self.leak_from_cycle
    }

    /// Current breathing cycle, starting at 1.
    pub fn cycle(&self) -> u32 {
        self.sweep.cycle()
    }

    /// Publish readings to `sink` every configured interval.
    ///
    /// Runs until `max_steps` records were written, or forever when `None`.
    /// Returns the number of records written.
    pub async fn run<S>(&mut self, sink: &mut S, max_steps: Option<u64>) -> AppResult<u64>
    where
        S: TelemetrySink + ?Sized,
    {
        info!(
            leak_from_cycle = self.leak_from_cycle,
            interval_ms = self.interval.as_millis() as u64,
            "Simulated breather started (cycle 1 healthy, leak from cycle {})",
            self.leak_from_cycle
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut written = 0u64;
        let mut last_cycle = self.cycle();
        while max_steps.map_or(true, |max| written < max) {
            ticker.tick().await;

            let reading = self.next_reading();
            let record = reading.to_record();
            sink.publish(&record).await?;
            written += 1;
            debug!(record = %record, "Simulated telemetry written");

            if self.cycle() != last_cycle {
                last_cycle = self.cycle();
                info!(
                    cycle = last_cycle,
                    leaking = self.is_leaking(),
                    "Breathing cycle {} started",
                    last_cycle
                );
            }
        }

        Ok(written)
    }
}

fn draw<R: Rng + ?Sized>(rng: &mut R, range: [u32; 2]) -> u32 {
    rng.gen_range(range[0]..=range[1])
}
