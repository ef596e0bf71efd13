//! Telemetry Producers
//!
//! Hardware-facing code that feeds the monitor: a simulated breather for
//! benches and demos, and the bridge for boards that only print raw values.

pub mod bridge;
pub mod mock;

pub use bridge::{run_serial_bridge, BridgeTranslator};
pub use mock::{MockBreather, SweepStep, ThermalSweep};
