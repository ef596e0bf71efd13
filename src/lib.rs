//! # SealGuard Core Library
//!
//! Leak monitoring for transformer conservators. While the oil cools, the
//! conservator must draw air in through its breather, which shows up as
//! bubbles. A cooling phase without bubbles means the seal is leaking.
//!
//! By organizing the project as a library, the same decision core serves the
//! `sealguard` CLI (`main.rs`), the integration tests and the benches.
//!
//! ## Crate Structure
//!
//! - **`telemetry`**: the `KEY=VALUE` record format and its parsed `TelemetryReading`.
//! - **`decision`**: trend tracking, the guardrail rules, the learned classifier seam
//!   and the `DecisionEngine` that composes them into one verdict per tick.
//! - **`data`**: the rolling display history and the synthetic training set.
//! - **`model`**: the isolation forest and its JSON artifact.
//! - **`source`**: transports between producers and the monitor (shared file, channel).
//! - **`hardware`**: the simulated breather and the raw serial bridge.
//! - **`emitter`**: packaging of verdicts and metrics for presentation.
//! - **`monitor`**: the polling tick loop.
//! - **`config`**: figment-based configuration (`config/sealguard.toml` + `SEALGUARD_*`).
//! - **`logging`**: `tracing-subscriber` initialization.
//! - **`error`**: the crate-wide `SealGuardError`.

pub mod config;
pub mod data;
pub mod decision;
pub mod emitter;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod model;
pub mod monitor;
pub mod source;
pub mod telemetry;

pub use decision::{DecisionEngine, Verdict};
pub use error::{AppResult, SealGuardError};
pub use telemetry::{parse_record, Phase, TelemetryReading};
