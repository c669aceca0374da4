use semsearch_core::error::Result;
use semsearch_core::traits::VectorStore;
use semsearch_core::types::Stats;

/// Count what `store` holds by walking every record.
///
/// A vector counts as valid when it is non-empty and matches the store's
/// dimension. With `corpus_documents` given, `document_count` is the corpus
/// size and `indexed` means every corpus document has a valid vector;
/// otherwise the store's own record count stands in for the corpus.
pub fn collect_stats(store: &dyn VectorStore, corpus_documents: Option<usize>) -> Result<Stats> {
    let expected = store.dimension();
    let (mut records, mut vectors) = (0usize, 0usize);
    let mut dimension = expected;
    for record in store.get_all()? {
        let record = record?;
        records += 1;
        let len = record.embedding.len();
        if len == 0 {
            continue;
        }
        match expected {
            Some(d) if d != len => {}
            _ => {
                vectors += 1;
                if dimension.is_none() {
                    dimension = Some(len);
                }
            }
        }
    }
    let document_count = corpus_documents.unwrap_or(records);
    Ok(Stats { document_count, vector_count: vectors, indexed: vectors == document_count, dimension })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use semsearch_core::types::DocumentRecord;

    fn record(id: &str) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            source: format!("{id}.txt"),
            text: String::new(),
            embedding: vec![0.5; 4],
            language: "en".to_string(),
            provider: String::new(),
        }
    }

    #[test]
    fn empty_store() {
        let stats = collect_stats(&MemoryStore::new(), None).unwrap();
        assert_eq!(stats.document_count, 0);
        assert_eq!(stats.vector_count, 0);
        assert_eq!(stats.dimension, None);
    }

    #[test]
    fn partially_indexed_corpus() {
        let store = MemoryStore::new();
        store.put(record("a")).unwrap();
        store.put(record("b")).unwrap();
        let stats = collect_stats(&store, Some(5)).unwrap();
        assert_eq!(stats.document_count, 5);
        assert_eq!(stats.vector_count, 2);
        assert!(!stats.indexed);
        assert_eq!(stats.dimension, Some(4));

        let stats = collect_stats(&store, None).unwrap();
        assert!(stats.indexed);
    }
}
