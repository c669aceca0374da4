use std::sync::Arc;

use tracing::{debug, warn};

use semsearch_core::config::ErrorPolicy;
use semsearch_core::error::{Error, Result};
use semsearch_core::traits::{validate_embedding, EmbeddingProvider, SearchEngine, VectorStore};
use semsearch_core::types::{DocumentRecord, ScoreKind, Scored, SearchResult, Stats};
use semsearch_vector::{collect_stats, retrieve};

use crate::degrades_to_empty;

/// Embed the query, then rank the store by cosine similarity.
pub struct SemanticSearch {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    on_error: ErrorPolicy,
    corpus_documents: Option<usize>,
}

impl SemanticSearch {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { provider, store, on_error: ErrorPolicy::Fail, corpus_documents: None }
    }

    #[must_use]
    pub fn with_error_policy(mut self, on_error: ErrorPolicy) -> Self {
        self.on_error = on_error;
        self
    }

    /// Size of the source corpus, when known, for `stats`.
    #[must_use]
    pub fn with_corpus_size(mut self, documents: usize) -> Self {
        self.corpus_documents = Some(documents);
        self
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.on_error
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    /// Best `count` records for `query`, scored by cosine similarity.
    ///
    /// Uses the store's native index when it has one. Every record looked
    /// at must have been embedded by this engine's provider.
    pub fn candidates(&self, query: &str, count: usize) -> Result<Vec<Scored<DocumentRecord>>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let tag = self.provider.tag();
        let vector = self.provider.embed_query(query)?;
        validate_embedding(tag, self.provider.dimension(), &vector)?;

        if let Some(hits) = self.store.nearest(&vector, count)? {
            for hit in &hits {
                self.check_provider(&hit.item)?;
            }
            return Ok(hits);
        }
        let scanned = self.store.get_all()?.map(|record| -> Result<DocumentRecord> {
            let record = record?;
            self.check_provider(&record)?;
            Ok(record)
        });
        let hits = retrieve(self.store.name(), &vector, scanned, count)?;
        debug!(provider = %tag, store = %self.store.name(), hits = hits.len(), "stage-1 retrieval");
        Ok(hits)
    }

    // Records written before provider tags existed carry an empty tag and
    // are accepted.
    fn check_provider(&self, record: &DocumentRecord) -> Result<()> {
        let tag = self.provider.tag();
        if record.provider.is_empty() || record.provider == tag {
            return Ok(());
        }
        Err(Error::ProviderMismatch {
            component: self.store.name().to_string(),
            id: record.id.clone(),
            expected: tag.to_string(),
            found: record.provider.clone(),
        })
    }
}

impl SearchEngine for SemanticSearch {
    fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let hits = match self.candidates(query, top_k) {
            Ok(hits) => hits,
            Err(e) if degrades_to_empty(self.on_error, &e) => {
                warn!(error = %e, "search failed, returning no results");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| SearchResult::from_record(hit.item, hit.score, i + 1, ScoreKind::Cosine))
            .collect())
    }

    fn stats(&self) -> Result<Stats> {
        collect_stats(self.store.as_ref(), self.corpus_documents)
    }
}
