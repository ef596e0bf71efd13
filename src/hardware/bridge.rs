//! ESP32 Serial Bridge
//!
//! Older sensor firmware prints bare measurements over USB serial:
//!
//! ```text
//! RAW_TEMP=30.5,RAW_BUBBLES=2
//! ```
//!
//! The bridge infers the breathing phase from the temperature trend, attaches
//! a status tag, and republishes each line as a regular telemetry record.
//!
//! [`BridgeTranslator`] is pure and always compiled. The serial-port reader
//! needs the `instrument_serial` feature.

use crate::config::BridgeConfig;
use crate::error::AppResult;
use crate::source::TelemetrySink;
use crate::telemetry::{ParseError, Phase, TelemetryReading};
use tracing::{debug, warn};

/// Status for a cooling sample with no bubbles.
pub const STATUS_LEAK: &str = "LEAK DETECTED";
/// Status for a cooling sample that bubbled.
pub const STATUS_HEALTHY: &str = "HEALTHY BREATHING";
/// Status for everything else.
pub const STATUS_MONITORING: &str = "MONITORING";

fn parse_finite(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Some firmware prints counts as `2.0`; the fractional part is dropped.
fn parse_bubble_count(value: &str) -> Option<u32> {
    if let Ok(count) = value.parse::<u32>() {
        return Some(count);
    }
    parse_finite(value)
        .map(f64::trunc)
        .filter(|count| (0.0..=f64::from(u32::MAX)).contains(count))
        .map(|count| count as u32)
}

/// Raw line → telemetry record translation.
///
/// The phase only changes when the temperature moves more than `threshold`
/// from the previous sample; otherwise the last phase is held. Starts in
/// [`Phase::Stable`] with a previous temperature of 0.
#[derive(Debug, Clone)]
pub struct BridgeTranslator {
    previous_temperature: f64,
    phase: Phase,
    threshold: f64,
}

impl Default for BridgeTranslator {
    fn default() -> Self {
        Self::new(BridgeConfig::default().phase_threshold)
    }
}

impl BridgeTranslator {
    /// Translator that flips phase on moves larger than `threshold` °C.
    pub fn new(threshold: f64) -> Self {
        Self {
            previous_temperature: 0.0,
            phase: Phase::Stable,
            threshold,
        }
    }

    /// Translator using `[bridge].phase_threshold`.
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.phase_threshold)
    }

    /// Translate one raw line.
    ///
    /// Lines without `RAW_TEMP` (boot banners, debug prints) yield `Ok(None)`.
    /// A malformed line is rejected without touching the phase state.
    pub fn translate(&mut self, line: &str) -> Result<Option<TelemetryReading>, ParseError> {
        let line = line.trim();
        if !line.contains("RAW_TEMP") {
            return Ok(None);
        }

        let mut temperature = None;
        let mut bubbles = 0u32;
        for pair in line.split(',') {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ParseError::MalformedPair {
                    pair: pair.to_string(),
                })?;
            let value = value.trim();
            match key.trim() {
                "RAW_TEMP" => {
                    temperature = Some(parse_finite(value).ok_or_else(|| {
                        ParseError::InvalidNumber {
                            key: "RAW_TEMP",
                            value: value.to_string(),
                        }
                    })?);
                }
                "RAW_BUBBLES" => {
                    bubbles = parse_bubble_count(value).ok_or_else(|| {
                        ParseError::InvalidNumber {
                            key: "RAW_BUBBLES",
                            value: value.to_string(),
                        }
                    })?;
                }
                _ => {}
            }
        }

        // "RAW_TEMP" appeared only inside some other key or value.
        let Some(temperature) = temperature else {
            return Ok(None);
        };

        if temperature > self.previous_temperature + self.threshold {
            self.phase = Phase::Heating;
        } else if temperature < self.previous_temperature - self.threshold {
            self.phase = Phase::Cooling;
        }
        self.previous_temperature = temperature;

        let status = match (self.phase, bubbles) {
            (Phase::Cooling, 0) => STATUS_LEAK,
            (Phase::Cooling, _) => STATUS_HEALTHY,
            _ => STATUS_MONITORING,
        };

        Ok(Some(
            TelemetryReading::new(temperature, bubbles, self.phase).with_status(status),
        ))
    }

    /// Translate `line` and publish the result to `sink`.
    ///
    /// Returns whether a record was published. Malformed lines are logged and
    /// skipped; only sink failures are errors.
    pub async fn relay<S>(&mut self, line: &str, sink: &mut S) -> AppResult<bool>
    where
        S: TelemetrySink + ?Sized,
    {
        match self.translate(line) {
            Ok(Some(reading)) => {
                let record = reading.to_record();
                sink.publish(&record).await?;
                debug!(raw = line.trim(), record = %record, "Bridged serial line");
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                warn!(raw = line.trim(), error = %e, "Skipping malformed serial line");
                Ok(false)
            }
        }
    }

    /// Phase inferred so far.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Temperature of the last translated line.
    pub fn previous_temperature(&self) -> f64 {
        self.previous_temperature
    }
}

/// Push lines from a blocking reader into `tx` until EOF, a hard read error,
/// or the receiving side is dropped.
///
/// Read timeouts are expected on a quiet port and only end the loop once the
/// receiver is gone.
#[cfg(any(test, feature = "instrument_serial"))]
fn forward_lines<R: std::io::BufRead>(
    mut reader: R,
    tx: &tokio::sync::mpsc::Sender<String>,
    port_name: &str,
) {
    use std::io::ErrorKind;

    let mut line = String::new();
    loop {
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                if tx.blocking_send(std::mem::take(&mut line)).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => {
                if tx.is_closed() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!(port = %port_name, "Discarding non-UTF-8 serial data");
                line.clear();
            }
            Err(e) => {
                warn!(port = %port_name, error = %e, "Serial read failed");
                break;
            }
        }
    }
}

/// Read the configured serial port and forward every line to `sink`.
///
/// Runs until the port closes or `max_records` records were published.
/// Returns the number of records published.
#[cfg(feature = "instrument_serial")]
pub async fn run_serial_bridge<S>(
    config: &BridgeConfig,
    sink: &mut S,
    max_records: Option<u64>,
) -> AppResult<u64>
where
    S: TelemetrySink + ?Sized,
{
    use crate::error::SealGuardError;
    use std::io::BufReader;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tracing::info;

    let port = serialport::new(config.port.as_str(), config.baud_rate)
        .timeout(Duration::from_millis(1000))
        .open()
        .map_err(|e| SealGuardError::Serial(format!("{}: {}", config.port, e)))?;
    info!(port = %config.port, baud_rate = config.baud_rate, "Serial bridge connected");

    let (tx, mut rx) = mpsc::channel::<String>(64);
    let port_name = config.port.clone();

    // Blocking serial reads run on a dedicated thread.
    let reader =
        tokio::task::spawn_blocking(move || forward_lines(BufReader::new(port), &tx, &port_name));

    let mut translator = BridgeTranslator::from_config(config);
    let mut published = 0u64;
    while max_records.map_or(true, |max| published < max) {
        let Some(line) = rx.recv().await else {
            break;
        };
        if translator.relay(&line, sink).await? {
            published += 1;
        }
    }

    drop(rx);
    reader
        .await
        .map_err(|e| SealGuardError::Serial(format!("serial reader task failed: {e}")))?;
    info!(published, "Serial bridge stopped");
    Ok(published)
}

/// Serial support is compiled out; always fails with
/// [`crate::error::SealGuardError::FeatureNotEnabled`].
#[cfg(not(feature = "instrument_serial"))]
pub async fn run_serial_bridge<S>(
    _config: &BridgeConfig,
    _sink: &mut S,
    _max_records: Option<u64>,
) -> AppResult<u64>
where
    S: TelemetrySink + ?Sized,
{
    Err(crate::error::SealGuardError::FeatureNotEnabled(
        "instrument_serial".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::channel;

    #[test]
    fn starts_stable_then_follows_trend() {
        let mut bridge = BridgeTranslator::default();
        assert_eq!(bridge.phase(), Phase::Stable);

        let reading = bridge.translate("RAW_TEMP=30.5,RAW_BUBBLES=0").unwrap().unwrap();
        assert_eq!(reading.phase, Phase::Heating, "30.5 is well above the initial 0");
        assert_eq!(reading.status.as_deref(), Some(STATUS_MONITORING));

        let reading = bridge.translate("RAW_TEMP=30.2,RAW_BUBBLES=3").unwrap().unwrap();
        assert_eq!(reading.phase, Phase::Cooling);
        assert_eq!(reading.status.as_deref(), Some(STATUS_HEALTHY));
    }

    #[test]
    fn small_moves_hold_the_phase() {
        let mut bridge = BridgeTranslator::default();
        bridge.translate("RAW_TEMP=40.0,RAW_BUBBLES=0").unwrap();
        bridge.translate("RAW_TEMP=39.5,RAW_BUBBLES=0").unwrap();

        let reading = bridge.translate("RAW_TEMP=39.45,RAW_BUBBLES=0").unwrap().unwrap();
        assert_eq!(reading.phase, Phase::Cooling);
        assert_eq!(reading.status.as_deref(), Some(STATUS_LEAK));
    }

    #[test]
    fn record_uses_telemetry_format() {
        let mut bridge = BridgeTranslator::default();
        let reading = bridge.translate("RAW_TEMP=30.5,RAW_BUBBLES=2").unwrap().unwrap();
        assert_eq!(
            reading.to_record(),
            "TEMP=30.50,PHASE=HEATING,BUBBLES=2,STATUS=MONITORING"
        );
    }

    #[test]
    fn ignores_lines_without_temperature() {
        let mut bridge = BridgeTranslator::default();
        assert!(bridge.translate("ESP32 boot ok").unwrap().is_none());
        assert!(bridge.translate("").unwrap().is_none());
        assert_eq!(bridge.phase(), Phase::Stable);
    }

    #[test]
    fn malformed_line_leaves_state_alone() {
        let mut bridge = BridgeTranslator::default();
        bridge.translate("RAW_TEMP=30.5,RAW_BUBBLES=0").unwrap();

        assert!(bridge.translate("RAW_TEMP=abc,RAW_BUBBLES=0").is_err());
        assert!(bridge.translate("RAW_TEMP=10.0,RAW_BUBBLES").is_err());
        assert_eq!(bridge.previous_temperature(), 30.5);
        assert_eq!(bridge.phase(), Phase::Heating);
    }

    #[test]
    fn decimal_bubble_counts_are_truncated() {
        let mut bridge = BridgeTranslator::default();
        let reading = bridge.translate("RAW_TEMP=30.5,RAW_BUBBLES=2.0").unwrap().unwrap();
        assert_eq!(reading.bubble_count, 2);

        let reading = bridge.translate("RAW_TEMP=30.2,RAW_BUBBLES=3.7").unwrap().unwrap();
        assert_eq!(reading.bubble_count, 3);

        assert!(bridge.translate("RAW_TEMP=30.0,RAW_BUBBLES=-1.0").is_err());
        assert!(bridge.translate("RAW_TEMP=30.0,RAW_BUBBLES=nan").is_err());
    }

    #[test]
    fn non_finite_temperature_is_rejected() {
        let mut bridge = BridgeTranslator::default();
        bridge.translate("RAW_TEMP=30.5,RAW_BUBBLES=0").unwrap();

        assert!(bridge.translate("RAW_TEMP=nan,RAW_BUBBLES=0").is_err());
        assert!(bridge.translate("RAW_TEMP=inf,RAW_BUBBLES=0").is_err());
        assert_eq!(bridge.previous_temperature(), 30.5);
    }

    #[tokio::test]
    async fn relay_publishes_only_valid_lines() {
        let (mut sink, mut source) = channel::channel(8);
        let mut bridge = BridgeTranslator::default();

        assert!(bridge.relay("RAW_TEMP=30.5,RAW_BUBBLES=0\n", &mut sink).await.unwrap());
        assert!(!bridge.relay("garbage", &mut sink).await.unwrap());
        assert!(!bridge.relay("RAW_TEMP=x", &mut sink).await.unwrap());

        use crate::source::TelemetrySource;
        let record = source.poll().await.unwrap();
        assert_eq!(
            record.as_deref(),
            Some("TEMP=30.50,PHASE=HEATING,BUBBLES=0,STATUS=MONITORING")
        );
    }

    /// Reader that never produces data, like an idle serial port.
    struct QuietPort;

    impl std::io::Read for QuietPort {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::TimedOut.into())
        }
    }

    #[tokio::test]
    async fn quiet_port_reader_stops_when_consumer_leaves() {
        let (tx, rx) = tokio::sync::mpsc::channel::<String>(1);
        let reader = tokio::task::spawn_blocking(move || {
            forward_lines(std::io::BufReader::new(QuietPort), &tx, "test")
        });
        drop(rx);
        tokio::time::timeout(std::time::Duration::from_secs(5), reader)
            .await
            .expect("reader should exit once the receiver is dropped")
            .unwrap();
    }

    #[tokio::test]
    async fn forwarded_lines_arrive_in_order() {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<String>(4);
        let input =
            std::io::Cursor::new("RAW_TEMP=30.5,RAW_BUBBLES=0\nRAW_TEMP=30.1,RAW_BUBBLES=2\n");
        tokio::task::spawn_blocking(move || forward_lines(input, &tx, "test"))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("RAW_TEMP=30.5,RAW_BUBBLES=0\n"));
        assert_eq!(rx.recv().await.as_deref(), Some("RAW_TEMP=30.1,RAW_BUBBLES=2\n"));
        assert_eq!(rx.recv().await, None);
    }

    #[cfg(not(feature = "instrument_serial"))]
    #[tokio::test]
    async fn serial_reader_requires_feature() {
        let (mut sink, _source) = channel::channel(1);
        let result = run_serial_bridge(&BridgeConfig::default(), &mut sink, Some(1)).await;
        assert!(matches!(
            result,
            Err(crate::error::SealGuardError::FeatureNotEnabled(_))
        ));
    }
}
