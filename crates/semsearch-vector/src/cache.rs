//! Load-once read cache in front of a slower store.
//!
//! The first full scan is kept in memory and served to every later query.
//! Writes go through to the inner store and drop the cached snapshot. A
//! scan that overlapped a write is returned to its caller but not kept.

use std::sync::{Arc, RwLock};

use tracing::debug;

use semsearch_core::error::{Error, Result};
use semsearch_core::traits::{RecordIter, VectorStore};
use semsearch_core::types::{DocumentRecord, Scored};

#[derive(Default)]
struct Snapshot {
    records: Option<Arc<Vec<DocumentRecord>>>,
    /// Bumped by every write.
    generation: u64,
}

pub struct CachedStore<S> {
    inner: S,
    snapshot: RwLock<Snapshot>,
}

impl<S: VectorStore> CachedStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, snapshot: RwLock::new(Snapshot::default()) }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot.read().map(|s| s.records.is_some()).unwrap_or(false)
    }

    fn invalidate(&self) {
        if let Ok(mut snapshot) = self.snapshot.write() {
            snapshot.generation = snapshot.generation.wrapping_add(1);
            snapshot.records = None;
        }
    }

    fn load(&self) -> Result<Arc<Vec<DocumentRecord>>> {
        let started = {
            let snapshot = self.snapshot.read().map_err(|_| self.poisoned())?;
            if let Some(records) = snapshot.records.as_ref() {
                return Ok(Arc::clone(records));
            }
            snapshot.generation
        };
        let records = Arc::new(self.inner.get_all()?.collect::<Result<Vec<_>>>()?);
        let mut snapshot = self.snapshot.write().map_err(|_| self.poisoned())?;
        if snapshot.generation == started {
            debug!(store = %self.inner.name(), records = records.len(), "cached full scan");
            snapshot.records = Some(Arc::clone(&records));
        } else {
            debug!(store = %self.inner.name(), "write during scan, not caching it");
        }
        Ok(records)
    }

    fn poisoned(&self) -> Error {
        Error::store(self.inner.name(), "cache lock poisoned")
    }
}

impl<S: VectorStore> VectorStore for CachedStore<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn dimension(&self) -> Option<usize> {
        self.inner.dimension()
    }

    fn put(&self, record: DocumentRecord) -> Result<()> {
        let result = self.inner.put(record);
        self.invalidate();
        result
    }

    fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        self.inner.get(id)
    }

    fn exists(&self, id: &str) -> Result<bool> {
        self.inner.exists(id)
    }

    fn remove(&self, id: &str) -> Result<bool> {
        let removed = self.inner.remove(id);
        self.invalidate();
        removed
    }

    fn get_all(&self) -> Result<RecordIter<'_>> {
        let records = self.load()?;
        Ok(Box::new((0..records.len()).map(move |i| Ok(records[i].clone()))))
    }

    fn nearest(&self, query: &[f32], top_k: usize) -> Result<Option<Vec<Scored<DocumentRecord>>>> {
        self.inner.nearest(query, top_k)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{mpsc, Mutex};
    use std::thread;

    use super::*;
    use crate::memory::MemoryStore;

    fn record(id: &str) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            source: format!("{id}.txt"),
            text: String::new(),
            embedding: vec![1.0, 0.0],
            language: "en".to_string(),
            provider: String::new(),
        }
    }

    #[test]
    fn snapshot_is_reused_until_a_write() {
        let cached = CachedStore::new(MemoryStore::new());
        cached.put(record("a")).unwrap();
        assert!(!cached.is_loaded());
        assert_eq!(cached.get_all().unwrap().count(), 1);
        assert!(cached.is_loaded());

        // Bypassing the cache leaves the snapshot stale.
        cached.inner().put(record("b")).unwrap();
        assert_eq!(cached.get_all().unwrap().count(), 1);

        cached.put(record("c")).unwrap();
        assert!(!cached.is_loaded());
        assert_eq!(cached.get_all().unwrap().count(), 3);
    }

    /// Reads everything, then waits to be released before handing it over.
    struct PausingStore {
        inner: MemoryStore,
        pause: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
    }

    impl VectorStore for PausingStore {
        fn name(&self) -> &str {
            "pausing"
        }

        fn dimension(&self) -> Option<usize> {
            self.inner.dimension()
        }

        fn put(&self, record: DocumentRecord) -> Result<()> {
            self.inner.put(record)
        }

        fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
            self.inner.get(id)
        }

        fn exists(&self, id: &str) -> Result<bool> {
            self.inner.exists(id)
        }

        fn remove(&self, id: &str) -> Result<bool> {
            self.inner.remove(id)
        }

        fn get_all(&self) -> Result<RecordIter<'_>> {
            let records: Vec<DocumentRecord> = self.inner.get_all()?.collect::<Result<_>>()?;
            if let Some((reached, resume)) = self.pause.lock().unwrap().take() {
                reached.send(()).unwrap();
                resume.recv().unwrap();
            }
            Ok(Box::new(records.into_iter().map(Ok)))
        }
    }

    #[test]
    fn write_during_first_scan_is_not_hidden_by_the_cache() {
        let (reached_tx, reached_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel();
        let cached = CachedStore::new(PausingStore {
            inner: MemoryStore::new(),
            pause: Mutex::new(Some((reached_tx, resume_rx))),
        });
        cached.put(record("a")).unwrap();

        thread::scope(|s| {
            let scan = s.spawn(|| cached.get_all().unwrap().count());
            reached_rx.recv().unwrap();
            cached.put(record("b")).unwrap();
            resume_tx.send(()).unwrap();
            assert_eq!(scan.join().unwrap(), 1);
        });

        assert!(!cached.is_loaded());
        assert_eq!(cached.get_all().unwrap().count(), 2);
        assert!(cached.is_loaded());
    }
}
