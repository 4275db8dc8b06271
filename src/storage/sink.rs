//! Destinations for scraped video records

use crate::error::Result;
use crate::types::VideoRecord;
use async_trait::async_trait;
use std::io::Write;
use std::sync::Mutex;

/// Accepts one video record at a time. Failures are per record.
///
/// Records are keyed by URL: a video already stored by an earlier run is not
/// inserted again.
#[async_trait]
pub trait VideoSink: Send + Sync {
    /// Whether a record with this URL is already stored
    async fn exists(&self, url: &str) -> Result<bool>;

    async fn insert(&self, video: &VideoRecord) -> Result<()>;
}

/// Writes records as JSON lines, used for dry runs
pub struct StdoutSink;

#[async_trait]
impl VideoSink for StdoutSink {
    async fn exists(&self, _url: &str) -> Result<bool> {
        Ok(false)
    }

    async fn insert(&self, video: &VideoRecord) -> Result<()> {
        let line = serde_json::to_string(video)?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", line)?;
        Ok(())
    }
}

/// Collects records in memory
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<VideoRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<VideoRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl VideoSink for MemorySink {
    async fn exists(&self, url: &str) -> Result<bool> {
        Ok(self
            .records
            .lock()
            .map(|r| r.iter().any(|v| v.url == url))
            .unwrap_or(false))
    }

    async fn insert(&self, video: &VideoRecord) -> Result<()> {
        if let Ok(mut records) = self.records.lock() {
            records.push(video.clone());
        }
        Ok(())
    }
}
