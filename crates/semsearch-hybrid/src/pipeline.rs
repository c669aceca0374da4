//! Two-stage retrieve-then-rerank.
//!
//! Stage 1 pulls `max(multiplier * k, floor)` candidates by cosine
//! similarity. Stage 2 scores each candidate's full text against the query
//! with the reranker and keeps the best `k`. The emitted score is always the
//! reranker's. A reranker failure fails the call; there is no fallback to
//! the stage-1 order.

use std::sync::Arc;

use tracing::{debug, warn};

use semsearch_core::config::SearchSettings;
use semsearch_core::error::{Error, Result};
use semsearch_core::traits::{Reranker, SearchEngine};
use semsearch_core::types::{ScoreKind, SearchResult, Stats};

use crate::degrades_to_empty;
use crate::semantic::SemanticSearch;

pub const DEFAULT_CANDIDATE_MULTIPLIER: usize = 4;
pub const DEFAULT_CANDIDATE_FLOOR: usize = 20;

pub struct HybridPipeline {
    first_stage: SemanticSearch,
    reranker: Arc<dyn Reranker>,
    candidate_multiplier: usize,
    candidate_floor: usize,
}

impl HybridPipeline {
    pub fn new(first_stage: SemanticSearch, reranker: Arc<dyn Reranker>) -> Self {
        Self {
            first_stage,
            reranker,
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
            candidate_floor: DEFAULT_CANDIDATE_FLOOR,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: &SearchSettings) -> Self {
        self.candidate_multiplier = settings.candidate_multiplier.max(1);
        self.candidate_floor = settings.candidate_floor;
        self
    }

    /// Stage-1 candidate count for a final `top_k`.
    pub fn candidate_count(&self, top_k: usize) -> usize {
        top_k.saturating_mul(self.candidate_multiplier).max(self.candidate_floor)
    }

    fn rerank(&self, query: &str, documents: &[&str]) -> Result<Vec<f64>> {
        let name = self.reranker.name();
        let scores = self.reranker.rerank(query, documents).map_err(|e| match e {
            Error::RerankFailure { .. } => e,
            other => Error::rerank(name, other),
        })?;
        if scores.len() != documents.len() {
            return Err(Error::rerank(
                name,
                format!("returned {} scores for {} candidates", scores.len(), documents.len()),
            ));
        }
        if let Some(bad) = scores.iter().position(|s| !s.is_finite()) {
            return Err(Error::rerank(name, format!("non-finite score for candidate {bad}")));
        }
        Ok(scores)
    }
}

impl SearchEngine for HybridPipeline {
    fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let count = self.candidate_count(top_k);
        let candidates = match self.first_stage.candidates(query, count) {
            Ok(candidates) => candidates,
            Err(e) if degrades_to_empty(self.first_stage.error_policy(), &e) => {
                warn!(error = %e, "stage-1 retrieval failed, returning no results");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let documents: Vec<&str> = candidates.iter().map(|c| c.item.text.as_str()).collect();
        let scores = self.rerank(query, &documents)?;
        debug!(reranker = %self.reranker.name(), candidates = candidates.len(), "stage-2 rerank");

        let mut reranked: Vec<_> = candidates.into_iter().zip(scores).collect();
        // Stable: equal relevance keeps stage-1 order.
        reranked.sort_by(|(_, a), (_, b)| b.total_cmp(a));
        reranked.truncate(top_k);
        Ok(reranked
            .into_iter()
            .enumerate()
            .map(|(i, (candidate, score))| SearchResult::from_record(candidate.item, score, i + 1, ScoreKind::Relevance))
            .collect())
    }

    fn stats(&self) -> Result<Stats> {
        self.first_stage.stats()
    }
}
