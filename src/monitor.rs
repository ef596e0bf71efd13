//! Monitor Tick Loop
//!
//! Composes a [`TelemetrySource`], the [`DecisionEngine`] and the
//! [`VerdictEmitter`] into the once-per-interval cycle:
//!
//! ```text
//! poll source ─┬─ nothing / empty / I/O error ──► WAITING (engine untouched)
//!              └─ record ─► parse ─┬─ error ────► notice  (engine untouched)
//!                                  └─ reading ──► decide, append history, present
//! ```
//!
//! Nothing inside a tick is fatal. The loop ends on the shutdown future or
//! after `max_ticks`.

use crate::config::{MonitorConfig, OutputMode, SealGuardConfig};
use crate::data::history::HistoryBuffer;
use crate::decision::engine::{Decision, DecisionEngine};
use crate::decision::guardrail::GuardrailEngine;
use crate::decision::verdict::WaitReason;
use crate::emitter::{Presentation, VerdictEmitter};
use crate::error::AppResult;
use crate::model::load_classifier;
use crate::source::TelemetrySource;
use crate::telemetry::ParseError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// What happened on one tick.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// A reading was processed.
    Decided(Decision),
    /// No usable record; the engine was not touched.
    Waiting(WaitReason),
    /// The record was malformed; the engine was not touched.
    Skipped(ParseError),
}

/// One tick's outcome and what to show for it.
#[derive(Debug, Clone)]
pub struct Tick {
    /// What the engine did.
    pub outcome: TickOutcome,
    /// Presentation for this tick.
    pub presentation: Presentation,
}

/// Polls a [`TelemetrySource`] and feeds the decision engine once per tick.
pub struct Monitor<S> {
    source: S,
    engine: DecisionEngine,
    emitter: VerdictEmitter,
    poll_interval: Duration,
    max_ticks: Option<u64>,
    output: OutputMode,
    source_down: bool,
}

impl<S: TelemetrySource> Monitor<S> {
    /// Monitor over `source` with an already built engine.
    pub fn new(source: S, engine: DecisionEngine, config: &MonitorConfig) -> Self {
        Self {
            source,
            engine,
            emitter: VerdictEmitter::new(),
            poll_interval: config.poll_interval,
            max_ticks: config.max_ticks,
            output: config.output,
            source_down: false,
        }
    }

    /// Build the engine from configuration and load the model artifact.
    pub fn from_config(source: S, config: &SealGuardConfig) -> Self {
        let engine = DecisionEngine::new(
            config.monitor.seed_temperature,
            GuardrailEngine::from_config(&config.guardrails),
            load_classifier(&config.monitor.model_path),
            HistoryBuffer::new(config.history.capacity, config.history.display_threshold),
        );
        Self::new(source, engine, &config.monitor)
    }

    /// Replace the presentation emitter.
    pub fn with_emitter(mut self, emitter: VerdictEmitter) -> Self {
        self.emitter = emitter;
        self
    }

    /// Run one tick immediately.
    pub async fn tick(&mut self) -> Tick {
        let raw = match self.source.poll().await {
            Ok(Some(raw)) if !raw.trim().is_empty() => {
                if self.source_down {
                    info!(source = %self.source.describe(), "Telemetry source recovered");
                    self.source_down = false;
                }
                raw
            }
            Ok(_) => {
                debug!(source = %self.source.describe(), "No telemetry record yet");
                return self.waiting();
            }
            Err(e) => {
                if !self.source_down {
                    warn!(source = %self.source.describe(), error = %e, "Telemetry source unavailable");
                    self.source_down = true;
                } else {
                    debug!(error = %e, "Telemetry source still unavailable");
                }
                return self.waiting();
            }
        };

        match self.engine.ingest(&raw) {
            Ok(decision) => {
                let presentation = self.emitter.present(&decision, &self.engine);
                Tick {
                    outcome: TickOutcome::Decided(decision),
                    presentation,
                }
            }
            Err(e) => {
                warn!(raw = raw.trim(), error = %e, "Skipping malformed telemetry record");
                let presentation = self.emitter.skipped(&raw, &e, &self.engine);
                Tick {
                    outcome: TickOutcome::Skipped(e),
                    presentation,
                }
            }
        }
    }

    fn waiting(&self) -> Tick {
        let reason = WaitReason::SourceUnavailable;
        Tick {
            outcome: TickOutcome::Waiting(reason),
            presentation: self.emitter.waiting(reason, &self.engine),
        }
    }

    /// Tick every `poll_interval` until `shutdown` resolves or `max_ticks`
    /// ticks ran. `on_tick` receives every tick; its error ends the loop.
    ///
    /// Returns the number of ticks run.
    pub async fn run_until<F, Fut>(&mut self, shutdown: Fut, mut on_tick: F) -> AppResult<u64>
    where
        F: FnMut(&Tick) -> AppResult<()>,
        Fut: Future<Output = ()>,
    {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            source = %self.source.describe(),
            interval_ms = self.poll_interval.as_millis() as u64,
            model = %self.engine.model_description().unwrap_or_else(|| "none".to_string()),
            "Monitor started"
        );

        let mut ticks = 0u64;
        while self.max_ticks.map_or(true, |max| ticks < max) {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let tick = self.tick().await;
                    ticks += 1;
                    on_tick(&tick)?;
                }
            }
        }

        info!(ticks, "Monitor stopped");
        Ok(ticks)
    }

    /// Run until Ctrl-C, printing every tick to stdout.
    pub async fn run(&mut self) -> AppResult<u64> {
        let output = self.output;
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };
        self.run_until(shutdown, |tick| {
            let mut stdout = std::io::stdout().lock();
            crate::emitter::write_presentation(&mut stdout, &tick.presentation, output)?;
            Ok(())
        })
        .await
    }

    /// Decision engine.
    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Telemetry source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Consume the monitor and keep the engine.
    pub fn into_engine(self) -> DecisionEngine {
        self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::verdict::VerdictKind;
    use crate::source::{channel, TelemetrySink};
    use tracing_test::traced_test;

    fn fast_config(max_ticks: Option<u64>) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_millis(1),
            max_ticks,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn empty_source_waits_without_touching_engine() {
        let (_sink, source) = channel::channel(4);
        let mut monitor = Monitor::new(source, DecisionEngine::default(), &fast_config(None));

        let tick = monitor.tick().await;
        assert!(matches!(
            tick.outcome,
            TickOutcome::Waiting(WaitReason::SourceUnavailable)
        ));
        assert_eq!(tick.presentation.message, "Waiting for ESP32 Signal...");
        assert!(monitor.engine().history().is_empty());
    }

    #[tokio::test]
    async fn blank_record_counts_as_unavailable() {
        let (mut sink, source) = channel::channel(4);
        let mut monitor = Monitor::new(source, DecisionEngine::default(), &fast_config(None));
        sink.publish("  \n").await.unwrap();

        let tick = monitor.tick().await;
        assert!(matches!(tick.outcome, TickOutcome::Waiting(_)));
    }

    #[traced_test]
    #[tokio::test]
    async fn malformed_record_is_skipped() {
        let (mut sink, source) = channel::channel(4);
        let mut monitor = Monitor::new(source, DecisionEngine::default(), &fast_config(None));

        sink.publish("TEMP=abc,PHASE=COOLING,BUBBLES=2").await.unwrap();
        let tick = monitor.tick().await;

        assert!(matches!(tick.outcome, TickOutcome::Skipped(_)));
        assert_eq!(monitor.engine().state().previous_temperature, 50.0);
        assert!(monitor.engine().history().is_empty());
        assert!(logs_contain("Skipping malformed telemetry record"));
    }

    #[tokio::test]
    async fn stale_reads_are_processed_again() {
        let (mut sink, source) = channel::channel(4);
        let mut monitor = Monitor::new(source, DecisionEngine::default(), &fast_config(None));

        sink.publish("TEMP=50.60,PHASE=HEATING,BUBBLES=0").await.unwrap();
        let first = monitor.tick().await;
        let second = monitor.tick().await;

        assert_eq!(first.presentation.verdict, VerdictKind::Normal);
        // Same record twice: zero delta, no model, so the engine abstains.
        assert_eq!(second.presentation.verdict, VerdictKind::Waiting);
        assert_eq!(second.presentation.sequence_index, Some(2));
    }

    #[tokio::test]
    async fn run_stops_after_max_ticks() {
        let (mut sink, source) = channel::channel(4);
        let mut monitor = Monitor::new(source, DecisionEngine::default(), &fast_config(Some(3)));
        sink.publish("TEMP=51.00,PHASE=HEATING,BUBBLES=0").await.unwrap();

        let mut seen = Vec::new();
        let ticks = monitor
            .run_until(std::future::pending(), |tick| {
                seen.push(tick.presentation.verdict);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(ticks, 3);
        assert_eq!(seen.len(), 3);
        assert_eq!(monitor.engine().history().len(), 3);
    }

    #[tokio::test]
    async fn shutdown_future_ends_the_loop() {
        let (_sink, source) = channel::channel(4);
        let mut monitor = Monitor::new(source, DecisionEngine::default(), &fast_config(None));

        let ticks = monitor.run_until(async {}, |_| Ok(())).await.unwrap();
        assert!(ticks <= 1);
    }
}
