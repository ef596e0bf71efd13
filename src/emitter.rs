//! Presentation packaging.
//!
//! [`VerdictEmitter`] turns a tick outcome into a [`Presentation`]: the
//! verdict, its banner severity and message, formatted metrics, the raw
//! record, the classifier's input delta, and the history snapshot for trend
//! charts. It reads engine state but never mutates it.
//!
//! Two renderings are provided: a console banner ([`render_text`]) and one
//! JSON object per tick ([`to_json`]).

use crate::config::OutputMode;
use crate::data::history::HistoryEntry;
use crate::decision::engine::{Decision, DecisionEngine};
use crate::decision::verdict::{Severity, Verdict, VerdictKind, WaitReason};
use crate::telemetry::ParseError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

/// Display-formatted readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    /// `"72.50 °C"`
    pub temperature: String,
    /// `"-0.50"`
    pub delta: String,
    /// Bubble count.
    pub bubbles: String,
    /// Producer phase tag.
    pub phase: String,
}

impl Metrics {
    /// Format the reading behind `decision`.
    pub fn from_decision(decision: &Decision) -> Self {
        Self {
            temperature: format!("{:.2} °C", decision.reading.temperature),
            delta: format!("{:.2}", decision.delta),
            bubbles: decision.reading.bubble_count.to_string(),
            phase: decision.reading.phase.to_string(),
        }
    }
}

/// Everything a dashboard needs for one tick.
#[derive(Debug, Clone, Serialize)]
pub struct Presentation {
    /// Wall-clock time the tick was presented.
    pub timestamp: DateTime<Utc>,
    /// Set only when the tick was processed.
    pub sequence_index: Option<u64>,
    /// Verdict kind; kept from the last tick when this one was skipped.
    pub verdict: VerdictKind,
    /// Display severity.
    pub severity: Severity,
    /// Headline text.
    pub message: String,
    /// Delta of the processed reading.
    pub current_delta: Option<f64>,
    /// Formatted reading, when one was processed.
    pub metrics: Option<Metrics>,
    /// Classifier input delta, four decimals.
    pub ml_delta: Option<String>,
    /// Raw record as read.
    pub raw: Option<String>,
    /// Whether an anomaly model is loaded.
    pub model_active: bool,
    /// Chart history, oldest first.
    pub history: Vec<HistoryEntry>,
}

/// Turns decisions into [`Presentation`]s.
#[derive(Debug, Clone)]
pub struct VerdictEmitter {
    include_history: bool,
}

impl Default for VerdictEmitter {
    fn default() -> Self {
        Self {
            include_history: true,
        }
    }
}

impl VerdictEmitter {
    /// Emitter that includes the history snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave the history snapshot out of every presentation.
    pub fn without_history(mut self) -> Self {
        self.include_history = false;
        self
    }

    /// A processed tick.
    pub fn present(&self, decision: &Decision, engine: &DecisionEngine) -> Presentation {
        let verdict = decision.verdict;
        Presentation {
            timestamp: Utc::now(),
            sequence_index: Some(decision.sequence_index),
            verdict: verdict.kind(),
            severity: verdict.severity(),
            message: verdict.message().to_string(),
            current_delta: Some(decision.delta),
            metrics: Some(Metrics::from_decision(decision)),
            ml_delta: Some(format!("{:.4}", decision.delta)),
            raw: decision.raw.clone(),
            model_active: engine.has_model(),
            history: self.history(engine),
        }
    }

    /// A tick that had nothing to decide on.
    pub fn waiting(&self, reason: WaitReason, engine: &DecisionEngine) -> Presentation {
        let verdict = Verdict::Waiting(reason);
        Presentation {
            timestamp: Utc::now(),
            sequence_index: None,
            verdict: verdict.kind(),
            severity: verdict.severity(),
            message: verdict.message().to_string(),
            current_delta: None,
            metrics: None,
            ml_delta: None,
            raw: None,
            model_active: engine.has_model(),
            history: self.history(engine),
        }
    }

    /// A tick skipped over a malformed record.
    ///
    /// The verdict stays at whatever the engine last decided; the notice is
    /// informational.
    pub fn skipped(&self, raw: &str, error: &ParseError, engine: &DecisionEngine) -> Presentation {
        Presentation {
            timestamp: Utc::now(),
            sequence_index: None,
            verdict: engine.last_verdict().kind(),
            severity: Severity::Info,
            message: format!("Skipped malformed telemetry: {error}"),
            current_delta: None,
            metrics: None,
            ml_delta: None,
            raw: Some(raw.trim().to_string()),
            model_active: engine.has_model(),
            history: self.history(engine),
        }
    }

    fn history(&self, engine: &DecisionEngine) -> Vec<HistoryEntry> {
        if self.include_history {
            engine.history().snapshot()
        } else {
            Vec::new()
        }
    }
}

/// Console banner for one tick.
pub fn render_text(p: &Presentation) -> String {
    let mut out = format!(
        "[{:<7}] {:<7} {}",
        p.severity.to_string(),
        p.verdict.to_string(),
        p.message
    );
    if let Some(m) = &p.metrics {
        let tick = p.sequence_index.unwrap_or_default();
        out.push_str(&format!(
            "\n          tick {tick} | temp {} | delta {} | bubbles {} | phase {}",
            m.temperature, m.delta, m.bubbles, m.phase
        ));
    }
    if let Some(raw) = &p.raw {
        out.push_str(&format!("\n          raw: {raw}"));
    }
    if let Some(ml) = &p.ml_delta {
        let model = if p.model_active { "active" } else { "not loaded" };
        out.push_str(&format!("\n          ml input delta {ml} | model {model}"));
    }
    out
}

/// Single-line JSON for one tick.
pub fn to_json(p: &Presentation) -> serde_json::Result<String> {
    serde_json::to_string(p)
}

/// Write `p` to `out` in the requested format, followed by a newline.
pub fn write_presentation<W: Write>(
    out: &mut W,
    p: &Presentation,
    mode: OutputMode,
) -> std::io::Result<()> {
    match mode {
        OutputMode::Text => writeln!(out, "{}", render_text(p)),
        OutputMode::Json => {
            let line = to_json(p).map_err(std::io::Error::other)?;
            writeln!(out, "{line}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_after(records: &[&str]) -> (DecisionEngine, Option<Decision>) {
        let mut engine = DecisionEngine::default();
        let mut last = None;
        for record in records {
            last = engine.ingest(record).ok();
        }
        (engine, last)
    }

    #[test]
    fn heating_tick_formats_metrics() {
        let (engine, decision) = engine_after(&["TEMP=51.20,PHASE=HEATING,BUBBLES=0"]);
        let decision = decision.unwrap();
        let p = VerdictEmitter::new().present(&decision, &engine);

        assert_eq!(p.verdict, VerdictKind::Normal);
        assert_eq!(p.severity, Severity::Success);
        assert_eq!(p.message, "System Heating (Normal)");
        let metrics = p.metrics.unwrap();
        assert_eq!(metrics.temperature, "51.20 °C");
        assert_eq!(metrics.delta, "1.20");
        assert_eq!(metrics.phase, "HEATING");
        assert_eq!(p.ml_delta.as_deref(), Some("1.2000"));
        assert_eq!(p.raw.as_deref(), Some("TEMP=51.20,PHASE=HEATING,BUBBLES=0"));
        assert!(!p.model_active);
        assert_eq!(p.history.len(), 1);
    }

    #[test]
    fn waiting_tick_has_no_metrics() {
        let engine = DecisionEngine::default();
        let p = VerdictEmitter::new().waiting(WaitReason::SourceUnavailable, &engine);

        assert_eq!(p.verdict, VerdictKind::Waiting);
        assert_eq!(p.severity, Severity::Info);
        assert_eq!(p.message, "Waiting for ESP32 Signal...");
        assert!(p.metrics.is_none());
        assert!(p.history.is_empty());
    }

    #[test]
    fn skipped_tick_keeps_last_verdict() {
        let (engine, _) = engine_after(&["TEMP=51.20,PHASE=HEATING,BUBBLES=0"]);
        let error = ParseError::InvalidNumber {
            key: "TEMP",
            value: "abc".into(),
        };
        let p = VerdictEmitter::new().skipped(" TEMP=abc ", &error, &engine);

        assert_eq!(p.verdict, VerdictKind::Normal);
        assert_eq!(p.severity, Severity::Info);
        assert!(p.message.contains("abc"));
        assert_eq!(p.raw.as_deref(), Some("TEMP=abc"));
    }

    #[test]
    fn history_can_be_left_out() {
        let (engine, decision) = engine_after(&["TEMP=51.20,PHASE=HEATING,BUBBLES=0"]);
        let p = VerdictEmitter::new()
            .without_history()
            .present(&decision.unwrap(), &engine);
        assert!(p.history.is_empty());
    }

    #[test]
    fn text_banner_shows_severity_and_message() {
        let (engine, decision) = engine_after(&[
            "TEMP=51.20,PHASE=HEATING,BUBBLES=0",
            "TEMP=50.80,PHASE=COOLING,BUBBLES=1",
        ]);
        let p = VerdictEmitter::new().present(&decision.unwrap(), &engine);
        let text = render_text(&p);

        assert!(text.starts_with("[ERROR  ] ANOMALY"));
        assert!(text.contains("LEAK DETECTED: Cooling without Bubbles"));
        assert!(text.contains("delta -0.40"));
    }

    #[test]
    fn json_line_is_a_single_object() {
        let (engine, decision) = engine_after(&["TEMP=51.20,PHASE=HEATING,BUBBLES=0"]);
        let p = VerdictEmitter::new().present(&decision.unwrap(), &engine);

        let mut buf = Vec::new();
        write_presentation(&mut buf, &p, OutputMode::Json).unwrap();
        let line = String::from_utf8(buf).unwrap();
        assert_eq!(line.matches('\n').count(), 1);

        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["verdict"], "NORMAL");
        assert_eq!(value["severity"], "success");
        assert_eq!(value["history"][0]["sequence_index"], 1);
        assert_eq!(value["history"][0]["threshold"], 85.0);
    }
}
