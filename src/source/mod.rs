//! Telemetry Transports
//!
//! The monitor and its producers never talk directly. A producer publishes
//! records through a [`TelemetrySink`]; the monitor polls a [`TelemetrySource`]
//! once per tick for the latest record.
//!
//! Two transports are provided:
//!
//! - [`file`]: the producer overwrites a single file and the monitor re-reads
//!   it each tick. Writes go through a temp file and a rename, so a poll never
//!   observes a half-written record.
//! - [`channel`]: a bounded `tokio::sync::mpsc` queue for producers running in
//!   the same process.
//!
//! Both deliver "latest wins" semantics: records published between two polls
//! are collapsed to the newest one, and a poll with nothing new may return the
//! previous record again (a stale read).

pub mod channel;
pub mod file;

pub use channel::{ChannelSink, ChannelSource};
pub use file::{FileSink, FileSource};

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Transport failures. None of them are fatal to the monitor.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Reading the telemetry file failed for a reason other than absence.
    #[error("failed to read telemetry from {path}: {source}")]
    Read {
        /// File being polled.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Staging or renaming the telemetry file failed.
    #[error("failed to write telemetry to {path}: {source}")]
    Write {
        /// Target file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The other half of the channel was dropped.
    #[error("telemetry channel closed")]
    ChannelClosed,
}

/// Capability: latest-record polling.
#[async_trait]
pub trait TelemetrySource: Send {
    /// Latest raw record, or `None` when nothing has been published yet.
    async fn poll(&mut self) -> Result<Option<String>, SourceError>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// Capability: record publication.
#[async_trait]
pub trait TelemetrySink: Send {
    /// Publish one record, replacing whatever the monitor would read next.
    async fn publish(&mut self, record: &str) -> Result<(), SourceError>;
}

#[async_trait]
impl<T: TelemetrySource + ?Sized> TelemetrySource for Box<T> {
    async fn poll(&mut self) -> Result<Option<String>, SourceError> {
        (**self).poll().await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[async_trait]
impl<T: TelemetrySink + ?Sized> TelemetrySink for Box<T> {
    async fn publish(&mut self, record: &str) -> Result<(), SourceError> {
        (**self).publish(record).await
    }
}
