use std::collections::HashMap;
use std::sync::RwLock;

use semsearch_core::error::{Error, Result};
use semsearch_core::traits::{RecordIter, VectorStore};
use semsearch_core::types::DocumentRecord;

use crate::check_record;

#[derive(Default)]
struct Inner {
    records: Vec<DocumentRecord>,
    index: HashMap<String, usize>,
    dimension: Option<usize>,
}

/// Volatile store; scans in insertion order. Intended for tests and
/// one-shot runs over small corpora.
pub struct MemoryStore {
    name: String,
    inner: RwLock<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { name: "memory".to_string(), inner: RwLock::new(Inner::default()) }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        let store = Self::new();
        if let Ok(mut inner) = store.inner.write() {
            inner.dimension = Some(dimension);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned(&self) -> Error {
        Error::store(&self.name, "lock poisoned")
    }
}

impl VectorStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> Option<usize> {
        self.inner.read().ok().and_then(|i| i.dimension)
    }

    fn put(&self, record: DocumentRecord) -> Result<()> {
        check_record(&self.name, &record)?;
        let mut inner = self.inner.write().map_err(|_| self.poisoned())?;
        match inner.dimension {
            Some(expected) if expected != record.dimension() => {
                return Err(Error::dimension(&self.name, expected, record.dimension()));
            }
            Some(_) => {}
            None => inner.dimension = Some(record.dimension()),
        }
        if let Some(&slot) = inner.index.get(&record.id) {
            inner.records[slot] = record;
        } else {
            let slot = inner.records.len();
            inner.index.insert(record.id.clone(), slot);
            inner.records.push(record);
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let inner = self.inner.read().map_err(|_| self.poisoned())?;
        Ok(inner.index.get(id).map(|&slot| inner.records[slot].clone()))
    }

    fn exists(&self, id: &str) -> Result<bool> {
        let inner = self.inner.read().map_err(|_| self.poisoned())?;
        Ok(inner.index.contains_key(id))
    }

    fn remove(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.write().map_err(|_| self.poisoned())?;
        let Some(slot) = inner.index.remove(id) else { return Ok(false) };
        inner.records.remove(slot);
        for later in inner.index.values_mut() {
            if *later > slot {
                *later -= 1;
            }
        }
        Ok(true)
    }

    /// Walks the records by position, taking the read lock once per record.
    /// Writes that land mid-scan may or may not be seen.
    fn get_all(&self) -> Result<RecordIter<'_>> {
        drop(self.inner.read().map_err(|_| self.poisoned())?);
        let mut next = 0;
        let mut done = false;
        Ok(Box::new(std::iter::from_fn(move || {
            if done {
                return None;
            }
            let Ok(inner) = self.inner.read() else {
                done = true;
                return Some(Err(self.poisoned()));
            };
            let record = inner.records.get(next).cloned();
            next += 1;
            done = record.is_none();
            record.map(Ok)
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, embedding: Vec<f32>) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            source: format!("{id}.txt"),
            text: String::new(),
            embedding,
            language: "en".to_string(),
            provider: String::new(),
        }
    }

    #[test]
    fn overwrite_keeps_position_and_remove_reindexes() {
        let store = MemoryStore::new();
        for id in ["a", "b", "c"] {
            store.put(record(id, vec![1.0])).unwrap();
        }
        store.put(record("a", vec![2.0])).unwrap();
        assert!(store.remove("b").unwrap());
        let ids: Vec<String> = store.get_all().unwrap().map(|r| r.unwrap().id).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(store.get("c").unwrap().unwrap().id, "c");
        assert_eq!(store.get("a").unwrap().unwrap().embedding, vec![2.0]);
    }

    #[test]
    fn empty_and_non_finite_embeddings_are_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(store.put(record("empty", Vec::new())), Err(Error::Store { .. })));
        assert!(matches!(store.put(record("nan", vec![f32::NAN, 1.0])), Err(Error::Store { .. })));
        assert!(matches!(store.put(record("inf", vec![f32::INFINITY, 1.0])), Err(Error::Store { .. })));
        assert!(store.is_empty());
        assert_eq!(store.dimension(), None);

        store.put(record("a", vec![1.0, 0.0])).unwrap();
        assert_eq!(store.dimension(), Some(2));
    }

    #[test]
    fn scan_sees_records_added_before_it_reaches_them() {
        let store = MemoryStore::new();
        store.put(record("a", vec![1.0])).unwrap();
        let mut scan = store.get_all().unwrap();
        assert_eq!(scan.next().unwrap().unwrap().id, "a");
        store.put(record("b", vec![1.0])).unwrap();
        assert_eq!(scan.next().unwrap().unwrap().id, "b");
        assert!(scan.next().is_none());
        assert!(scan.next().is_none());
    }

    #[test]
    fn preset_dimension_rejects_other_lengths() {
        let store = MemoryStore::with_dimension(3);
        assert!(matches!(store.put(record("a", vec![1.0])), Err(Error::DimensionMismatch { expected: 3, actual: 1, .. })));
        assert!(store.is_empty());
    }
}
