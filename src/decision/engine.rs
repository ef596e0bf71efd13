//! Per-tick decision function.
//!
//! `DecisionEngine` owns every piece of mutable state the core needs: the
//! one-step [`TrendTracker`] and the rolling [`HistoryBuffer`]. Each tick the
//! verdict is recomputed from scratch:
//!
//! ```text
//! verdict = guardrails.evaluate(delta, bubbles)
//!        OR classifier.classify(delta, bubbles)     (only if a model is loaded)
//!        OR WAITING(model unavailable)
//! ```
//!
//! There is no hysteresis. The cooling guardrail must fire on the tick it sees
//! the signature, independent of what came before.

use crate::data::history::{HistoryBuffer, HistoryEntry};
use crate::decision::classifier::AnomalyClassifier;
use crate::decision::guardrail::GuardrailEngine;
use crate::decision::trend::{DecisionState, TrendTracker};
use crate::decision::verdict::{Verdict, WaitReason};
use crate::telemetry::{parse_record, ParseError, TelemetryReading};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Result of one successfully processed tick.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    /// Position of this tick in the history sequence (1-based).
    pub sequence_index: u64,
    /// Temperature change since the previous tick.
    pub delta: f64,
    /// Verdict for this tick.
    pub verdict: Verdict,
    /// Parsed reading.
    pub reading: TelemetryReading,
    /// Raw record as read from the source, when available.
    pub raw: Option<String>,
}

/// Hybrid guardrail/model decision core with its carried state.
#[derive(Debug)]
pub struct DecisionEngine {
    trend: TrendTracker,
    guardrails: GuardrailEngine,
    classifier: Option<AnomalyClassifier>,
    history: HistoryBuffer,
    last_verdict: Verdict,
}

impl DecisionEngine {
    /// Build an engine whose first delta is measured against `seed_temperature`.
    pub fn new(
        seed_temperature: f64,
        guardrails: GuardrailEngine,
        classifier: Option<AnomalyClassifier>,
        history: HistoryBuffer,
    ) -> Self {
        Self {
            trend: TrendTracker::new(seed_temperature),
            guardrails,
            classifier,
            history,
            last_verdict: Verdict::default(),
        }
    }

    /// Pure decision for one feature pair. Does not touch engine state.
    pub fn decide(&self, delta: f64, bubble_count: u32) -> Verdict {
        self.guardrails
            .evaluate(delta, bubble_count)
            .or_else(|| {
                self.classifier
                    .as_ref()
                    .map(|classifier| classifier.classify(delta, bubble_count))
            })
            .unwrap_or(Verdict::Waiting(WaitReason::ModelUnavailable))
    }

    /// Parse `raw` and process it.
    ///
    /// A parse failure returns before any state is touched.
    pub fn ingest(&mut self, raw: &str) -> Result<Decision, ParseError> {
        let reading = parse_record(raw)?;
        let mut decision = self.process(reading);
        decision.raw = Some(raw.trim().to_string());
        Ok(decision)
    }

    /// Run one tick over an already parsed reading.
    pub fn process(&mut self, reading: TelemetryReading) -> Decision {
        let delta = self.trend.update(&reading);
        let verdict = self.decide(delta, reading.bubble_count);
        let sequence_index = self.trend.next_tick();

        self.history.append(HistoryEntry::new(
            sequence_index,
            reading.temperature,
            reading.bubble_count,
            self.history.display_threshold(),
        ));

        debug!(
            tick = sequence_index,
            temperature = reading.temperature,
            bubbles = reading.bubble_count,
            phase = %reading.phase,
            delta,
            verdict = %verdict.kind(),
            "Processed telemetry tick"
        );
        self.note_transition(verdict, sequence_index, delta, reading.bubble_count);

        Decision {
            sequence_index,
            delta,
            verdict,
            reading,
            raw: None,
        }
    }

    fn note_transition(&mut self, verdict: Verdict, tick: u64, delta: f64, bubbles: u32) {
        if verdict.kind() == self.last_verdict.kind() {
            self.last_verdict = verdict;
            return;
        }

        if verdict.is_anomaly() {
            warn!(
                tick,
                delta,
                bubbles,
                guardrail = verdict.is_guardrail(),
                "{}",
                verdict.message()
            );
        } else {
            info!(
                tick,
                from = %self.last_verdict.kind(),
                to = %verdict.kind(),
                "{}",
                verdict.message()
            );
        }
        self.last_verdict = verdict;
    }

    /// Carried trend state.
    pub fn state(&self) -> &DecisionState {
        self.trend.state()
    }

    /// Rolling history of processed ticks.
    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Verdict of the most recent successful tick.
    pub fn last_verdict(&self) -> Verdict {
        self.last_verdict
    }

    /// Whether an anomaly model is loaded.
    pub fn has_model(&self) -> bool {
        self.classifier.is_some()
    }

    /// Description of the loaded model, if any.
    pub fn model_description(&self) -> Option<String> {
        self.classifier.as_ref().map(AnomalyClassifier::describe)
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(
            crate::decision::trend::DEFAULT_SEED_TEMPERATURE,
            GuardrailEngine::default(),
            None,
            HistoryBuffer::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::classifier::tests::FixedModel;
    use crate::decision::classifier::ModelLabel;
    use crate::decision::verdict::{AnomalyCause, NormalCause, VerdictKind};
    use crate::telemetry::Phase;

    fn engine_with(seed: f64, label: Option<ModelLabel>) -> DecisionEngine {
        DecisionEngine::new(
            seed,
            GuardrailEngine::default(),
            label.map(|l| AnomalyClassifier::new(FixedModel(l))),
            HistoryBuffer::default(),
        )
    }

    #[test]
    fn cooling_record_without_bubbles_is_anomaly() {
        let mut engine = engine_with(73.0, None);
        let decision = engine.ingest("TEMP=72.50,PHASE=COOLING,BUBBLES=1").unwrap();
        assert!((decision.delta + 0.50).abs() < 1e-9);
        assert_eq!(
            decision.verdict,
            Verdict::Anomaly(AnomalyCause::CoolingWithoutBubbles)
        );
        assert_eq!(decision.raw.as_deref(), Some("TEMP=72.50,PHASE=COOLING,BUBBLES=1"));
    }

    #[test]
    fn heating_record_is_normal_even_if_model_disagrees() {
        let mut engine = engine_with(59.0, Some(ModelLabel::Outlier));
        let decision = engine.ingest("TEMP=60.10,PHASE=HEATING,BUBBLES=0").unwrap();
        assert!((decision.delta - 1.10).abs() < 1e-9);
        assert_eq!(decision.verdict, Verdict::Normal(NormalCause::Heating));
    }

    #[test]
    fn model_decides_inside_deadband() {
        let mut engine = engine_with(50.0, Some(ModelLabel::Outlier));
        let decision = engine.process(TelemetryReading::new(50.02, 0, Phase::Unknown));
        assert_eq!(decision.verdict, Verdict::Anomaly(AnomalyCause::ModelOutlier));

        let mut engine = engine_with(50.0, Some(ModelLabel::Inlier));
        let decision = engine.process(TelemetryReading::new(49.6, 12, Phase::Cooling));
        assert_eq!(decision.verdict, Verdict::Normal(NormalCause::ModelInlier));
    }

    #[test]
    fn missing_model_never_fabricates_a_call() {
        let mut engine = engine_with(50.0, None);
        let decision = engine.process(TelemetryReading::new(49.6, 12, Phase::Cooling));
        assert_eq!(decision.verdict.kind(), VerdictKind::Waiting);

        let decision = engine.process(TelemetryReading::new(49.6, 12, Phase::Cooling));
        assert_eq!(
            decision.verdict,
            Verdict::Waiting(WaitReason::ModelUnavailable)
        );
    }

    #[test]
    fn parse_error_leaves_state_untouched() {
        let mut engine = engine_with(73.0, None);
        engine.ingest("TEMP=72.50,PHASE=COOLING,BUBBLES=1").unwrap();
        let before = engine.state().clone();

        assert!(engine.ingest("TEMP=abc,PHASE=COOLING,BUBBLES=2").is_err());
        assert_eq!(engine.state(), &before);
        assert_eq!(engine.history().len(), 1);
        assert!(engine.last_verdict().is_anomaly());
    }

    #[test]
    fn non_finite_temperature_cannot_mask_the_cooling_guardrail() {
        let mut engine = engine_with(61.0, Some(ModelLabel::Inlier));
        assert!(engine.ingest("TEMP=NaN,PHASE=COOLING,BUBBLES=0").is_err());
        assert!(engine.ingest("TEMP=inf,PHASE=COOLING,BUBBLES=0").is_err());
        assert_eq!(engine.state().previous_temperature, 61.0);
        assert!(engine.history().is_empty());

        let decision = engine.ingest("TEMP=60.00,PHASE=COOLING,BUBBLES=0").unwrap();
        assert!((decision.delta + 1.0).abs() < 1e-9);
        assert_eq!(
            decision.verdict,
            Verdict::Anomaly(AnomalyCause::CoolingWithoutBubbles)
        );
    }

    #[test]
    fn sequence_index_follows_successful_ticks() {
        let mut engine = DecisionEngine::default();
        engine.ingest("TEMP=50.3,PHASE=HEATING,BUBBLES=0").unwrap();
        let _ = engine.ingest("garbage");
        let decision = engine.ingest("TEMP=50.6,PHASE=HEATING,BUBBLES=0").unwrap();
        assert_eq!(decision.sequence_index, 2);
        let indices: Vec<u64> = engine
            .history()
            .snapshot()
            .iter()
            .map(|e| e.sequence_index)
            .collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn guardrail_is_not_suppressed_by_previous_normal() {
        let mut engine = engine_with(50.0, Some(ModelLabel::Inlier));
        assert_eq!(
            engine.process(TelemetryReading::new(50.6, 0, Phase::Heating)).verdict,
            Verdict::Normal(NormalCause::Heating)
        );
        assert_eq!(
            engine.process(TelemetryReading::new(50.2, 0, Phase::Cooling)).verdict,
            Verdict::Anomaly(AnomalyCause::CoolingWithoutBubbles)
        );
    }
}
