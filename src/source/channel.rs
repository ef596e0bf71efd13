//! In-process transport over `tokio::sync::mpsc`.

use super::{SourceError, TelemetrySink, TelemetrySource};
use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TryRecvError};

/// Default queue depth for [`channel`].
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Create a connected sink/source pair.
pub fn channel(capacity: usize) -> (ChannelSink, ChannelSource) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelSink::new(tx), ChannelSource::new(rx))
}

/// Drains everything queued since the last poll and keeps only the newest.
///
/// With `repeat_stale` on (the default) a poll with nothing new returns the
/// previous record again, the same thing a re-read of an unchanged file would
/// yield. Once the producer hangs up, the last record keeps being served; if
/// there never was one the poll fails with [`SourceError::ChannelClosed`].
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<String>,
    last: Option<String>,
    repeat_stale: bool,
    closed: bool,
}

impl ChannelSource {
    /// Source over an existing receiver. Stale reads are on.
    pub fn new(rx: mpsc::Receiver<String>) -> Self {
        Self {
            rx,
            last: None,
            repeat_stale: true,
            closed: false,
        }
    }

    /// Return `None` instead of the previous record when nothing new arrived.
    pub fn without_stale_reads(mut self) -> Self {
        self.repeat_stale = false;
        self
    }

    /// Whether the producer side has hung up.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl TelemetrySource for ChannelSource {
    async fn poll(&mut self) -> Result<Option<String>, SourceError> {
        let mut fresh = None;
        while !self.closed {
            match self.rx.try_recv() {
                Ok(record) => fresh = Some(record),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.closed = true,
            }
        }

        if let Some(record) = fresh {
            self.last = Some(record.clone());
            return Ok(Some(record));
        }

        match (&self.last, self.closed) {
            (None, true) => Err(SourceError::ChannelClosed),
            (Some(last), _) if self.repeat_stale => Ok(Some(last.clone())),
            _ => Ok(None),
        }
    }

    fn describe(&self) -> String {
        "in-process channel".to_string()
    }
}

/// Producer half of [`channel`].
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<String>,
}

impl ChannelSink {
    /// Sink over an existing sender.
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl TelemetrySink for ChannelSink {
    async fn publish(&mut self, record: &str) -> Result<(), SourceError> {
        self.tx
            .send(record.to_string())
            .await
            .map_err(|_| SourceError::ChannelClosed)
    }
}
