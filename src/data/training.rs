//! Synthetic healthy-breathing dataset.
//!
//! The generator replays the thermal sweep the monitor sees, at the monitor's
//! one-second sampling rate, and records the `(temp_delta, bubbles)` pair the
//! classifier is later asked about. Every row describes a healthy seal: cooling
//! always bubbles. The isolation forest learns that region of feature space.
//!
//! Rows are exchanged as CSV with a `temp_delta,bubbles` header.

use crate::config::TrainingConfig;
use crate::error::AppResult;
use crate::hardware::mock::ThermalSweep;
use crate::telemetry::Phase;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One training row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    /// Temperature change since the previous step.
    pub temp_delta: f64,
    /// Bubbles counted in the step.
    pub bubbles: u32,
}

impl TrainingSample {
    /// Build one row.
    pub fn new(temp_delta: f64, bubbles: u32) -> Self {
        Self {
            temp_delta,
            bubbles,
        }
    }

    /// Feature vector in model order.
    pub fn features(&self) -> [f64; 2] {
        [self.temp_delta, f64::from(self.bubbles)]
    }
}

/// Simulate `config.steps` ticks of healthy breathing.
pub fn generate_healthy_samples<R: Rng + ?Sized>(
    config: &TrainingConfig,
    rng: &mut R,
) -> Vec<TrainingSample> {
    let mut sweep = ThermalSweep::new(
        config.start_temp,
        config.min_temp,
        config.max_temp,
        config.heating_rate,
        config.cooling_rate,
        config.noise,
    );
    let [low, high] = config.cooling_bubbles;

    (0..config.steps)
        .map(|_| {
            let step = sweep.step(rng);
            let bubbles = match step.phase {
                Phase::Cooling => rng.gen_range(low..=high),
                _ => 0,
            };
            TrainingSample::new(step.delta(), bubbles)
        })
        .collect()
}

/// Write samples as CSV. Returns the number of rows written.
#[cfg(feature = "storage_csv")]
pub fn write_samples_csv(path: &Path, samples: &[TrainingSample]) -> AppResult<usize> {
    use crate::error::SealGuardError;

    let mut writer =
        csv::Writer::from_path(path).map_err(|e| SealGuardError::Storage(e.to_string()))?;
    for sample in samples {
        writer
            .serialize(sample)
            .map_err(|e| SealGuardError::Storage(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| SealGuardError::Storage(e.to_string()))?;
    tracing::info!(rows = samples.len(), path = %path.display(), "Training data written");
    Ok(samples.len())
}

/// Read samples from CSV.
#[cfg(feature = "storage_csv")]
pub fn read_samples_csv(path: &Path) -> AppResult<Vec<TrainingSample>> {
    use crate::error::SealGuardError;

    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| SealGuardError::Storage(format!("{}: {}", path.display(), e)))?;
    reader
        .deserialize()
        .enumerate()
        .map(|(row, record)| {
            record.map_err(|e| {
                SealGuardError::Storage(format!("{} row {}: {}", path.display(), row + 1, e))
            })
        })
        .collect()
}

/// CSV support is compiled out.
#[cfg(not(feature = "storage_csv"))]
pub fn write_samples_csv(_path: &Path, _samples: &[TrainingSample]) -> AppResult<usize> {
    Err(crate::error::SealGuardError::FeatureNotEnabled(
        "storage_csv".to_string(),
    ))
}

/// CSV support is compiled out.
#[cfg(not(feature = "storage_csv"))]
pub fn read_samples_csv(_path: &Path) -> AppResult<Vec<TrainingSample>> {
    Err(crate::error::SealGuardError::FeatureNotEnabled(
        "storage_csv".to_string(),
    ))
}
