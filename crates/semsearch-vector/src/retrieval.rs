//! Exhaustive top-K ranking.
//!
//! A full linear scan, O(n·d) per query, holding only the best `top_k`
//! records in memory. Ties keep scan order.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use semsearch_core::error::{Error, Result};
use semsearch_core::traits::VectorStore;
use semsearch_core::types::{DocumentRecord, Scored};

use crate::similarity::cosine_similarity;

struct Ranked {
    score: f64,
    seq: usize,
    record: DocumentRecord,
}

// Greater is better: higher score, then earlier in the scan.
impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.total_cmp(&other.score).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Rank `candidates` against `query`, best first, at most `top_k` of them.
///
/// An empty candidate set gives an empty list. A candidate whose vector
/// length differs from the query fails the call with `DimensionMismatch`
/// attributed to `component`.
pub fn retrieve<I>(component: &str, query: &[f32], candidates: I, top_k: usize) -> Result<Vec<Scored<DocumentRecord>>>
where
    I: IntoIterator<Item = Result<DocumentRecord>>,
{
    if top_k == 0 {
        return Ok(Vec::new());
    }
    let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(top_k.saturating_add(1).min(4096));
    for (seq, candidate) in candidates.into_iter().enumerate() {
        let record = candidate?;
        if record.embedding.len() != query.len() {
            return Err(Error::dimension(component, query.len(), record.embedding.len()));
        }
        let score = cosine_similarity(query, &record.embedding);
        heap.push(Reverse(Ranked { score, seq, record }));
        if heap.len() > top_k {
            heap.pop();
        }
    }
    let mut ranked: Vec<Ranked> = heap.into_iter().map(|Reverse(r)| r).collect();
    ranked.sort_unstable_by(|a, b| b.cmp(a));
    Ok(ranked.into_iter().map(|r| Scored { item: r.record, score: r.score }).collect())
}

/// Top-K from a store: its native index when it has one, else a full scan.
pub fn retrieve_from(store: &dyn VectorStore, query: &[f32], top_k: usize) -> Result<Vec<Scored<DocumentRecord>>> {
    if top_k == 0 {
        return Ok(Vec::new());
    }
    if let Some(hits) = store.nearest(query, top_k)? {
        return Ok(hits);
    }
    retrieve(store.name(), query, store.get_all()?, top_k)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, embedding: Vec<f32>) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            source: format!("{id}.txt"),
            text: format!("text of {id}"),
            embedding,
            language: "en".to_string(),
            provider: "fake:test".to_string(),
        }
    }

    fn ids(hits: &[Scored<DocumentRecord>]) -> Vec<&str> {
        hits.iter().map(|h| h.item.id.as_str()).collect()
    }

    #[test]
    fn ties_keep_scan_order() {
        // id1 and id2 point exactly along the query; id3 is 45 degrees off.
        let q = vec![1.0, 0.0];
        let candidates = vec![
            Ok(record("id1", vec![2.0, 0.0])),
            Ok(record("id2", vec![5.0, 0.0])),
            Ok(record("id3", vec![1.0, 1.0])),
        ];
        let hits = retrieve("test", &q, candidates, 2).unwrap();
        assert_eq!(ids(&hits), vec!["id1", "id2"]);
        assert_eq!(hits[0].score, hits[1].score);
    }

    #[test]
    fn ties_keep_scan_order_under_eviction() {
        let q = vec![1.0, 0.0];
        let candidates = (0..50).map(|i| Ok(record(&format!("d{i:02}"), vec![1.0, 0.0])));
        let hits = retrieve("test", &q, candidates, 3).unwrap();
        assert_eq!(ids(&hits), vec!["d00", "d01", "d02"]);
    }

    #[test]
    fn sorted_descending_and_bounded() {
        let q = vec![1.0, 0.0, 0.0];
        let candidates = vec![
            Ok(record("c", vec![0.0, 1.0, 0.0])),
            Ok(record("a", vec![1.0, 0.1, 0.0])),
            Ok(record("d", vec![-1.0, 0.0, 0.0])),
            Ok(record("b", vec![1.0, 1.0, 0.0])),
        ];
        let hits = retrieve("test", &q, candidates, 3).unwrap();
        assert_eq!(ids(&hits), vec!["a", "b", "c"]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn nan_candidate_never_outranks_real_matches() {
        let q = vec![1.0, 0.0];
        let candidates = vec![
            Ok(record("broken", vec![f32::NAN, 0.0])),
            Ok(record("close", vec![0.9, 0.1])),
            Ok(record("far", vec![0.1, 0.9])),
        ];
        let hits = retrieve("test", &q, candidates, 3).unwrap();
        assert_eq!(ids(&hits), vec!["close", "far", "broken"]);
        assert!(hits.iter().all(|h| h.score.is_finite()));
    }

    #[test]
    fn empty_candidates_give_empty_list() {
        let hits = retrieve("test", &[1.0], Vec::new(), 5).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn top_k_larger_than_corpus_returns_everything_once() {
        let q = vec![0.5, 0.5];
        let candidates = vec![Ok(record("x", vec![1.0, 0.0])), Ok(record("y", vec![0.0, 1.0]))];
        let hits = retrieve("test", &q, candidates, 100).unwrap();
        assert_eq!(ids(&hits), vec!["x", "y"]);
    }

    #[test]
    fn zero_top_k_is_empty() {
        let hits = retrieve("test", &[1.0], vec![Ok(record("x", vec![1.0]))], 0).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn mismatched_candidate_dimension_fails() {
        let err = retrieve("store", &[1.0, 0.0], vec![Ok(record("x", vec![1.0, 0.0, 0.0]))], 1).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3, .. }));
        assert_eq!(err.component(), "store");
    }

    #[test]
    fn candidate_errors_propagate() {
        let candidates = vec![Ok(record("x", vec![1.0])), Err(Error::store("s", "disk gone"))];
        assert!(matches!(retrieve("s", &[1.0], candidates, 5), Err(Error::Store { .. })));
    }
}
