use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{DocumentRecord, Scored, SearchResult, Stats};

/// Lazily produced records. Persistent stores read one record at a time;
/// the in-memory store walks its records under short read locks.
pub type RecordIter<'a> = Box<dyn Iterator<Item = Result<DocumentRecord>> + Send + 'a>;

/// Text to fixed-length vector, with separate document and query encodings.
pub trait EmbeddingProvider: Send + Sync {
    /// Stable `<kind>:<model>` identifier written into every record.
    fn tag(&self) -> &str;
    fn dimension(&self) -> usize;
    fn embed_document(&self, text: &str) -> Result<Vec<f32>>;
    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

/// Owner of persisted `(id, vector, metadata)` records.
///
/// All vectors in one store share a dimension. `put` overwrites by id and
/// must leave the store untouched when it fails.
pub trait VectorStore: Send + Sync {
    fn name(&self) -> &str;
    /// Established dimension, `None` until the first record fixes it.
    fn dimension(&self) -> Option<usize>;
    fn put(&self, record: DocumentRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<DocumentRecord>>;
    fn exists(&self, id: &str) -> Result<bool>;
    fn remove(&self, id: &str) -> Result<bool>;
    fn get_all(&self) -> Result<RecordIter<'_>>;

    /// Native top-K for backends that index vectors themselves.
    /// `Ok(None)` means the caller has to scan `get_all`.
    fn nearest(&self, _query: &[f32], _top_k: usize) -> Result<Option<Vec<Scored<DocumentRecord>>>> {
        Ok(None)
    }
}

/// More expensive second-pass scorer for `(query, candidate text)` pairs.
pub trait Reranker: Send + Sync {
    fn name(&self) -> &str;
    /// One relevance score per document, in input order.
    fn rerank(&self, query: &str, documents: &[&str]) -> Result<Vec<f64>>;
}

pub trait SearchEngine: Send + Sync {
    fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>>;
    fn stats(&self) -> Result<Stats>;
}

/// Fails with `DimensionMismatch` unless `vector` has `expected` entries.
pub fn validate_dimension(component: &str, expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() == expected {
        Ok(())
    } else {
        Err(Error::dimension(component, expected, vector.len()))
    }
}

/// Position of the first NaN or infinite component.
pub fn first_non_finite(vector: &[f32]) -> Option<usize> {
    vector.iter().position(|x| !x.is_finite())
}

/// Checks a freshly produced embedding: the dimension must match, and a NaN
/// or infinite component is a `ProviderRequest` attributed to `tag`.
pub fn validate_embedding(tag: &str, expected: usize, vector: &[f32]) -> Result<()> {
    validate_dimension(tag, expected, vector)?;
    match first_non_finite(vector) {
        None => Ok(()),
        Some(i) => Err(Error::request(tag, format!("embedding component {i} is {}", vector[i]))),
    }
}

impl<T: VectorStore + ?Sized> VectorStore for Arc<T> {
    fn name(&self) -> &str { (**self).name() }
    fn dimension(&self) -> Option<usize> { (**self).dimension() }
    fn put(&self, record: DocumentRecord) -> Result<()> { (**self).put(record) }
    fn get(&self, id: &str) -> Result<Option<DocumentRecord>> { (**self).get(id) }
    fn exists(&self, id: &str) -> Result<bool> { (**self).exists(id) }
    fn remove(&self, id: &str) -> Result<bool> { (**self).remove(id) }
    fn get_all(&self) -> Result<RecordIter<'_>> { (**self).get_all() }
    fn nearest(&self, query: &[f32], top_k: usize) -> Result<Option<Vec<Scored<DocumentRecord>>>> {
        (**self).nearest(query, top_k)
    }
}

impl<T: EmbeddingProvider + ?Sized> EmbeddingProvider for Arc<T> {
    fn tag(&self) -> &str { (**self).tag() }
    fn dimension(&self) -> usize { (**self).dimension() }
    fn embed_document(&self, text: &str) -> Result<Vec<f32>> { (**self).embed_document(text) }
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> { (**self).embed_query(text) }
}
