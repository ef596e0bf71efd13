//! Telemetry records and their parsed form.
//!
//! A producer (the ESP32, the serial bridge, or [`crate::hardware::mock::MockBreather`])
//! publishes one line per sample:
//!
//! ```text
//! TEMP=72.50,PHASE=COOLING,BUBBLES=1,STATUS=LEAK
//! ```
//!
//! Pairs are separated by `,` and split on the first `=`. Unknown keys are
//! ignored, missing keys fall back to `TEMP=0.0`, `BUBBLES=0`, `PHASE=UNKNOWN`.
//! A pair without `=`, a non-numeric `TEMP`/`BUBBLES`, or a `TEMP` of `nan`/`inf`
//! rejects the whole record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Breathing phase reported by the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Oil temperature rising; the conservator exhales.
    Heating,
    /// Oil temperature falling; gas should be drawn in through the seal.
    Cooling,
    /// Bridge has not yet seen a temperature change.
    Stable,
    /// Missing or unrecognised phase tag.
    Unknown,
}

impl Phase {
    /// Wire representation used in telemetry records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Heating => "HEATING",
            Phase::Cooling => "COOLING",
            Phase::Stable => "STABLE",
            Phase::Unknown => "UNKNOWN",
        }
    }

    /// Lenient parse: anything unrecognised maps to [`Phase::Unknown`].
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "HEATING" => Phase::Heating,
            "COOLING" => Phase::Cooling,
            "STABLE" => Phase::Stable,
            _ => Phase::Unknown,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while parsing a telemetry record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// A comma-separated segment had no `=`.
    #[error("malformed pair '{pair}' (expected KEY=VALUE)")]
    MalformedPair {
        /// The offending segment.
        pair: String,
    },

    /// A numeric field could not be parsed, or is not finite.
    #[error("invalid value '{value}' for {key}")]
    InvalidNumber {
        /// Record key, `TEMP` or `BUBBLES`.
        key: &'static str,
        /// Raw value as received.
        value: String,
    },
}

/// One parsed sample. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReading {
    /// Oil temperature in °C.
    pub temperature: f64,
    /// Bubbles counted since the previous sample.
    pub bubble_count: u32,
    /// Producer-reported phase.
    pub phase: Phase,
    /// Producer's own status tag (`STATUS=`), if present.
    pub status: Option<String>,
}

impl TelemetryReading {
    /// Build a reading without a status tag.
    pub fn new(temperature: f64, bubble_count: u32, phase: Phase) -> Self {
        Self {
            temperature,
            bubble_count,
            phase,
            status: None,
        }
    }

    /// Attach a producer status tag.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Serialize back into the wire format.
    pub fn to_record(&self) -> String {
        let mut line = format!(
            "TEMP={:.2},PHASE={},BUBBLES={}",
            self.temperature, self.phase, self.bubble_count
        );
        if let Some(status) = &self.status {
            line.push_str(",STATUS=");
            line.push_str(status);
        }
        line
    }
}

impl FromStr for TelemetryReading {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_record(s)
    }
}

/// Parse one telemetry record.
///
/// The caller is expected to have filtered out empty records; an empty string
/// parses as the all-defaults reading.
pub fn parse_record(line: &str) -> Result<TelemetryReading, ParseError> {
    let mut temperature = 0.0;
    let mut bubble_count = 0;
    let mut phase = Phase::Unknown;
    let mut status = None;

    let line = line.trim();
    if line.is_empty() {
        return Ok(TelemetryReading::new(temperature, bubble_count, phase));
    }

    for pair in line.split(',') {
        let (key, value) = pair.split_once('=').ok_or_else(|| ParseError::MalformedPair {
            pair: pair.to_string(),
        })?;
        let value = value.trim();

        match key.trim() {
            "TEMP" => {
                temperature = value
                    .parse::<f64>()
                    .ok()
                    .filter(|t| t.is_finite())
                    .ok_or_else(|| ParseError::InvalidNumber {
                        key: "TEMP",
                        value: value.to_string(),
                    })?;
            }
            "BUBBLES" => {
                bubble_count = value.parse::<u32>().map_err(|_| ParseError::InvalidNumber {
                    key: "BUBBLES",
                    value: value.to_string(),
                })?;
            }
            "PHASE" => phase = Phase::from_tag(value),
            "STATUS" => status = Some(value.to_string()),
            _ => {}
        }
    }

    Ok(TelemetryReading {
        temperature,
        bubble_count,
        phase,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_record() {
        let reading = parse_record("TEMP=72.50,PHASE=COOLING,BUBBLES=1").unwrap();
        assert_eq!(reading.temperature, 72.50);
        assert_eq!(reading.phase, Phase::Cooling);
        assert_eq!(reading.bubble_count, 1);
        assert_eq!(reading.status, None);
    }

    #[test]
    fn captures_status_and_ignores_unknown_keys() {
        let reading =
            parse_record("TEMP=60.10,PHASE=HEATING,BUBBLES=0,STATUS=HEALTHY,RSSI=-61").unwrap();
        assert_eq!(reading.status.as_deref(), Some("HEALTHY"));
        assert_eq!(reading.phase, Phase::Heating);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let reading = parse_record("TEMP=55.0,PHASE=COOLING").unwrap();
        assert_eq!(reading.bubble_count, 0);

        let reading = parse_record("BUBBLES=3").unwrap();
        assert_eq!(reading.temperature, 0.0);
        assert_eq!(reading.phase, Phase::Unknown);
    }

    #[test]
    fn pair_without_equals_rejects_record() {
        let err = parse_record("TEMP=55.0,COOLING,BUBBLES=2").unwrap_err();
        assert_eq!(
            err,
            ParseError::MalformedPair {
                pair: "COOLING".into()
            }
        );
    }

    #[test]
    fn non_numeric_fields_reject_record() {
        let err = parse_record("TEMP=abc,PHASE=COOLING,BUBBLES=2").unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { key: "TEMP", .. }));

        let err = parse_record("TEMP=50.0,BUBBLES=-1").unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { key: "BUBBLES", .. }));
    }

    #[test]
    fn non_finite_temperature_rejects_record() {
        for raw in ["nan", "NaN", "inf", "-inf", "infinity"] {
            let err = parse_record(&format!("TEMP={raw},PHASE=COOLING,BUBBLES=0")).unwrap_err();
            assert_eq!(
                err,
                ParseError::InvalidNumber {
                    key: "TEMP",
                    value: raw.to_string(),
                }
            );
        }
    }

    #[test]
    fn trailing_newline_is_tolerated() {
        let reading = parse_record("TEMP=50.25,PHASE=HEATING,BUBBLES=0\n").unwrap();
        assert_eq!(reading.temperature, 50.25);
        assert_eq!(reading.bubble_count, 0);
    }

    #[test]
    fn unrecognised_phase_is_unknown() {
        assert_eq!(Phase::from_tag("steady"), Phase::Unknown);
        assert_eq!(Phase::from_tag("cooling"), Phase::Cooling);
    }

    #[test]
    fn record_formatting_matches_producer() {
        let reading = TelemetryReading::new(72.5, 1, Phase::Cooling).with_status("LEAK");
        assert_eq!(
            reading.to_record(),
            "TEMP=72.50,PHASE=COOLING,BUBBLES=1,STATUS=LEAK"
        );
        assert_eq!(parse_record(&reading.to_record()).unwrap(), reading);
    }
}
