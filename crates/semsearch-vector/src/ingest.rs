//! Resumable corpus ingestion.
//!
//! Each entry whose id is already stored is skipped, so an interrupted run
//! picks up where it stopped. The rest are embedded with bounded
//! concurrency and retried with exponential backoff on rate limits and
//! transient outages. Fatal errors (bad configuration, dimension
//! mismatch, store failure) abort the run; anything else is recorded
//! against the entry and the run continues.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use semsearch_core::config::IngestSettings;
use semsearch_core::error::{Error, Result};
use semsearch_core::traits::{validate_embedding, EmbeddingProvider, VectorStore};
use semsearch_core::types::{CorpusEntry, DocumentRecord};

const COMPONENT: &str = "ingest";

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub concurrency: usize,
    /// Attempts per entry, the first one included.
    pub max_retries: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Re-embed stored entries whose text has changed instead of skipping them.
    pub reembed_changed: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::from(&IngestSettings::default())
    }
}

impl From<&IngestSettings> for IngestOptions {
    fn from(s: &IngestSettings) -> Self {
        Self {
            concurrency: s.concurrency.max(1),
            max_retries: s.max_retries.max(1),
            base_backoff: Duration::from_millis(s.base_backoff_ms),
            max_backoff: Duration::from_millis(s.max_backoff_ms),
            reembed_changed: s.reembed_changed,
        }
    }
}

impl IngestOptions {
    /// Delay before attempt `attempt + 1`, doubling from the base.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let exp = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
        self.base_backoff.saturating_mul(1 << exp).min(self.max_backoff)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    Skipped(String),
    Embedded(String),
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestFailure {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub embedded: usize,
    pub skipped: usize,
    pub failed: Vec<IngestFailure>,
}

impl IngestReport {
    pub fn total(&self) -> usize {
        self.embedded + self.skipped + self.failed.len()
    }
}

type Progress = Arc<dyn Fn(&IngestEvent) + Send + Sync>;

pub struct Ingestor {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    options: IngestOptions,
    progress: Option<Progress>,
}

enum Outcome {
    Skipped,
    Embedded,
}

impl Ingestor {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>, options: IngestOptions) -> Self {
        Self { provider, store, options, progress: None }
    }

    /// Called once per entry as it completes, in completion order.
    #[must_use]
    pub fn with_progress(mut self, progress: impl Fn(&IngestEvent) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    pub async fn run<I>(&self, corpus: I) -> Result<IngestReport>
    where
        I: IntoIterator<Item = CorpusEntry>,
    {
        info!(
            provider = %self.provider.tag(),
            store = %self.store.name(),
            concurrency = self.options.concurrency,
            "starting ingestion"
        );
        let mut report = IngestReport::default();
        let mut outcomes = stream::iter(corpus.into_iter().map(|entry| async move {
            let id = entry.id.clone();
            (id, self.ingest_one(entry).await)
        }))
        .buffer_unordered(self.options.concurrency);

        while let Some((id, outcome)) = outcomes.next().await {
            let event = match outcome {
                Ok(Outcome::Skipped) => {
                    report.skipped += 1;
                    IngestEvent::Skipped(id)
                }
                Ok(Outcome::Embedded) => {
                    report.embedded += 1;
                    IngestEvent::Embedded(id)
                }
                Err(e) if e.is_fatal() => {
                    warn!(%id, error = %e, "aborting ingestion");
                    return Err(e);
                }
                Err(e) => {
                    warn!(%id, error = %e, "entry failed");
                    report.failed.push(IngestFailure { id: id.clone(), error: e.to_string() });
                    IngestEvent::Failed(id)
                }
            };
            if let Some(progress) = &self.progress {
                progress(&event);
            }
        }
        info!(
            embedded = report.embedded,
            skipped = report.skipped,
            failed = report.failed.len(),
            "ingestion finished"
        );
        Ok(report)
    }

    async fn ingest_one(&self, entry: CorpusEntry) -> Result<Outcome> {
        if self.already_stored(&entry).await? {
            debug!(id = %entry.id, "already stored, skipping");
            return Ok(Outcome::Skipped);
        }
        let embedding = self.embed_with_retry(&entry).await?;
        validate_embedding(self.provider.tag(), self.provider.dimension(), &embedding)?;
        let record = DocumentRecord::new(entry, embedding, self.provider.tag());
        let store = Arc::clone(&self.store);
        blocking(move || store.put(record)).await?;
        Ok(Outcome::Embedded)
    }

    async fn already_stored(&self, entry: &CorpusEntry) -> Result<bool> {
        let store = Arc::clone(&self.store);
        let id = entry.id.clone();
        if !self.options.reembed_changed {
            return blocking(move || store.exists(&id)).await;
        }
        let stored = blocking(move || store.get(&id)).await?;
        Ok(stored.is_some_and(|record| record.text == entry.text))
    }

    async fn embed_with_retry(&self, entry: &CorpusEntry) -> Result<Vec<f32>> {
        let mut attempt = 1;
        loop {
            let provider = Arc::clone(&self.provider);
            let text = entry.text.clone();
            match blocking(move || provider.embed_document(&text)).await {
                Ok(embedding) => return Ok(embedding),
                Err(e) if e.is_retryable() && attempt < self.options.max_retries => {
                    let delay = e.retry_after().unwrap_or_else(|| self.options.backoff(attempt)).min(self.options.max_backoff);
                    warn!(id = %entry.id, attempt, delay_ms = delay.as_millis(), error = %e, "retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Provider and store calls block (file IO, blocking HTTP), so they run on
/// tokio's blocking pool.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::store(COMPONENT, format!("worker task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let options = IngestOptions {
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(1_000),
            ..IngestOptions::default()
        };
        assert_eq!(options.backoff(1), Duration::from_millis(100));
        assert_eq!(options.backoff(2), Duration::from_millis(200));
        assert_eq!(options.backoff(4), Duration::from_millis(800));
        assert_eq!(options.backoff(5), Duration::from_millis(1_000));
        assert_eq!(options.backoff(500), Duration::from_millis(1_000));
    }
}
