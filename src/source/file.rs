//! Shared-file transport.

use super::{SourceError, TelemetrySink, TelemetrySource};
use async_trait::async_trait;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Re-reads one file per poll. A missing file means "no record yet".
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Source reading `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Watched file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TelemetrySource for FileSource {
    async fn poll(&mut self) -> Result<Option<String>, SourceError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                trace!(path = %self.path.display(), bytes = content.len(), "Read telemetry file");
                Ok(Some(content))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SourceError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Overwrites one file per publish, atomically.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    staging: PathBuf,
}

impl FileSink {
    /// The staging file sits next to `path` so the final rename stays on one
    /// filesystem.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut name = path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("telemetry"));
        name.push(".tmp");
        let staging = path.with_file_name(name);
        Self { path, staging }
    }

    /// Target file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TelemetrySink for FileSink {
    async fn publish(&mut self, record: &str) -> Result<(), SourceError> {
        let write_err = |source| SourceError::Write {
            path: self.path.clone(),
            source,
        };
        tokio::fs::write(&self.staging, record)
            .await
            .map_err(write_err)?;
        tokio::fs::rename(&self.staging, &self.path)
            .await
            .map_err(write_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FileSource::new(dir.path().join("esp_data.txt"));
        assert!(source.poll().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sink_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("esp_data.txt");
        let mut sink = FileSink::new(&path);
        let mut source = FileSource::new(&path);

        sink.publish("TEMP=50.30,PHASE=HEATING,BUBBLES=0").await.unwrap();
        sink.publish("TEMP=50.60,PHASE=HEATING,BUBBLES=0").await.unwrap();

        assert_eq!(
            source.poll().await.unwrap().as_deref(),
            Some("TEMP=50.60,PHASE=HEATING,BUBBLES=0")
        );
        assert!(!dir.path().join("esp_data.txt.tmp").exists());
    }

    #[tokio::test]
    async fn directory_path_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FileSource::new(dir.path());
        assert!(matches!(
            source.poll().await,
            Err(SourceError::Read { .. })
        ));
    }
}
