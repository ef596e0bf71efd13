//! CLI Entry Point for SealGuard
//!
//! Provides command-line interface for:
//! - Monitoring a live telemetry file (the deployed mode)
//! - Simulating an ESP32 breather when no board is attached
//! - Generating training data and fitting the anomaly model offline
//! - Bridging raw serial output from older firmware
//!
//! # Usage
//!
//! ```bash
//! sealguard simulate &                 # writes esp_data.txt every 500 ms
//! sealguard monitor --max-ticks 300    # one verdict per second
//!
//! sealguard generate --steps 50000     # transformer_healthy_data.csv
//! sealguard train                      # sealguard_model.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sealguard::config::{OutputMode, SealGuardConfig, DEFAULT_CONFIG_PATH};
use sealguard::data::training::{generate_healthy_samples, read_samples_csv, write_samples_csv};
use sealguard::hardware::{run_serial_bridge, MockBreather};
use sealguard::logging;
use sealguard::model::{save_model, ForestParams, IsolationForest};
use sealguard::monitor::Monitor;
use sealguard::source::channel::{channel, DEFAULT_CHANNEL_CAPACITY};
use sealguard::source::{FileSink, FileSource};
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "sealguard")]
#[command(about = "Transformer breathing-cycle leak monitor", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the telemetry file and print one verdict per tick
    Monitor {
        /// Telemetry file written by the producer
        #[arg(long)]
        telemetry: Option<PathBuf>,

        /// Anomaly model artifact
        #[arg(long)]
        model: Option<PathBuf>,

        /// Stop after this many ticks
        #[arg(long)]
        max_ticks: Option<u64>,

        /// One JSON object per tick instead of the console banner
        #[arg(long)]
        json: bool,
    },

    /// Run the simulated ESP32, overwriting the telemetry file
    Simulate {
        /// Telemetry file to write
        #[arg(long)]
        output: Option<PathBuf>,

        /// RNG seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,

        /// Stop after this many records
        #[arg(long)]
        max_steps: Option<u64>,
    },

    /// Write a synthetic healthy-breathing training set (CSV)
    Generate {
        #[arg(long)]
        output: Option<PathBuf>,

        /// Number of simulated one-second ticks
        #[arg(long)]
        steps: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Fit the isolation forest on a training CSV and save the artifact
    Train {
        /// Training CSV (temp_delta,bubbles)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Model artifact to write
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Simulator and monitor in one process, connected by a channel
    Demo {
        /// Number of monitor ticks to run
        #[arg(long, default_value = "120")]
        ticks: u64,
    },

    /// Translate raw ESP32 serial lines into the telemetry file
    Bridge {
        /// Telemetry file to write
        #[arg(long)]
        output: Option<PathBuf>,

        /// Serial port, overriding the configuration
        #[arg(long)]
        port: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = SealGuardConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    config.validate().context("Invalid configuration")?;
    logging::init_from_config(&config).context("Failed to initialize logging")?;

    match cli.command {
        Commands::Monitor {
            telemetry,
            model,
            max_ticks,
            json,
        } => {
            if let Some(path) = telemetry {
                config.monitor.telemetry_path = path;
            }
            if let Some(path) = model {
                config.monitor.model_path = path;
            }
            if max_ticks.is_some() {
                config.monitor.max_ticks = max_ticks;
            }
            if json {
                config.monitor.output = OutputMode::Json;
            }

            let source = FileSource::new(&config.monitor.telemetry_path);
            let mut monitor = Monitor::from_config(source, &config);
            monitor.run().await.context("Monitor loop failed")?;
        }

        Commands::Simulate {
            output,
            seed,
            max_steps,
        } => {
            if seed.is_some() {
                config.simulator.seed = seed;
            }
            let path = output.unwrap_or_else(|| config.monitor.telemetry_path.clone());
            let mut sink = FileSink::new(&path);
            let mut breather = MockBreather::from_config(&config.simulator);
            info!(path = %path.display(), "Writing simulated telemetry");

            tokio::select! {
                result = breather.run(&mut sink, max_steps) => {
                    let written = result.context("Simulator failed")?;
                    info!(written, "Simulation finished");
                }
                _ = signal::ctrl_c() => {
                    info!("Simulation stopped");
                }
            }
        }

        Commands::Generate {
            output,
            steps,
            seed,
        } => {
            if let Some(steps) = steps {
                config.training.steps = steps;
            }
            if let Some(seed) = seed {
                config.training.seed = seed;
            }
            let path = output.unwrap_or_else(|| config.training.data_path.clone());

            let mut rng = StdRng::seed_from_u64(config.training.seed);
            let samples = generate_healthy_samples(&config.training, &mut rng);
            write_samples_csv(&path, &samples)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Generated {} samples into {}", samples.len(), path.display());
        }

        Commands::Train { data, output } => {
            let data_path = data.unwrap_or_else(|| config.training.data_path.clone());
            let model_path = output.unwrap_or_else(|| config.monitor.model_path.clone());

            let samples = read_samples_csv(&data_path)
                .with_context(|| format!("Failed to read {}", data_path.display()))?;
            let features: Vec<[f64; 2]> = samples.iter().map(|s| s.features()).collect();

            let forest = IsolationForest::fit(&features, &ForestParams::from_config(&config.training))
                .context("Failed to fit isolation forest")?;
            info!(
                rows = features.len(),
                trees = forest.n_trees(),
                offset = forest.offset(),
                "Isolation forest trained"
            );
            save_model(&model_path, &forest)
                .with_context(|| format!("Failed to save {}", model_path.display()))?;
            println!("Model saved to {}", model_path.display());
        }

        Commands::Demo { ticks } => {
            config.monitor.max_ticks = Some(ticks);
            let (mut sink, source) = channel(DEFAULT_CHANNEL_CAPACITY);
            let simulator = config.simulator.clone();
            let producer = tokio::spawn(async move {
                let mut breather = MockBreather::from_config(&simulator);
                breather.run(&mut sink, None).await
            });

            let mut monitor = Monitor::from_config(source, &config);
            let result = monitor.run().await;
            producer.abort();
            result.context("Monitor loop failed")?;
        }

        Commands::Bridge { output, port } => {
            if let Some(port) = port {
                config.bridge.port = port;
            }
            let path = output.unwrap_or_else(|| config.monitor.telemetry_path.clone());
            let mut sink = FileSink::new(&path);

            tokio::select! {
                result = run_serial_bridge(&config.bridge, &mut sink, None) => {
                    let published = result.context("Serial bridge failed")?;
                    info!(published, "Serial bridge finished");
                }
                _ = signal::ctrl_c() => {
                    warn!("Serial bridge interrupted");
                }
            }
        }
    }

    Ok(())
}
