//! One JSON file per document under a directory.
//!
//! Files are named `<percent-encoded id>.json` and written through a
//! temporary sibling plus rename, so a crash never leaves a half-written
//! record behind. Hidden files (leading `.`) are ignored on scan, which
//! also covers stray temporaries.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tempfile::NamedTempFile;
use tracing::debug;

use semsearch_core::error::{Error, Result};
use semsearch_core::traits::{RecordIter, VectorStore};
use semsearch_core::types::DocumentRecord;

use crate::check_record;

const RECORD_EXT: &str = "json";

// `.` stays encoded so no id can produce a hidden file.
const ID_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

pub struct FileStore {
    dir: PathBuf,
    name: String,
    dimension: Mutex<Option<usize>>,
}

impl FileStore {
    /// Open (creating if needed) a store whose dimension is taken from the
    /// first existing record, or from the first `put` on an empty store.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let name = format!("file:{}", dir.display());
        fs::create_dir_all(&dir).map_err(|e| Error::store(&name, format!("cannot create {}: {e}", dir.display())))?;
        let mut store = Self { dir, name, dimension: Mutex::new(None) };
        let existing = store.record_paths()?.into_iter().next();
        if let Some(path) = existing {
            let first = store.read_record(&path)?;
            *store.dimension.get_mut().map_err(|_| Error::store(&store.name, "dimension lock poisoned"))? = Some(first.dimension());
        }
        debug!(store = %store.name, "opened file store");
        Ok(store)
    }

    /// Open a store that must hold `dimension`-length vectors.
    pub fn open_with_dimension(dir: impl Into<PathBuf>, dimension: usize) -> Result<Self> {
        let mut store = Self::open(dir)?;
        let established = store.dimension.get_mut().map_err(|_| Error::store(&store.name, "dimension lock poisoned"))?;
        match *established {
            Some(found) if found != dimension => return Err(Error::dimension(&store.name, dimension, found)),
            _ => *established = Some(dimension),
        }
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{RECORD_EXT}", utf8_percent_encode(id, ID_ESCAPES)))
    }

    /// Record files in name order, so scans are deterministic.
    fn record_paths(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| Error::store(&self.name, e))?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::store(&self.name, e))?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else { continue };
            if file_name.starts_with('.') {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXT) && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn read_record(&self, path: &Path) -> Result<DocumentRecord> {
        let bytes = fs::read(path).map_err(|e| Error::store(&self.name, format!("{}: {e}", path.display())))?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Corrupt {
            component: self.name.clone(),
            location: path.display().to_string(),
            cause: e.to_string(),
        })
    }

    fn write_atomically(&self, path: &Path, record: &DocumentRecord) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(record).map_err(|e| Error::store(&self.name, e))?;
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| Error::store(&self.name, e))?;
        tmp.write_all(&bytes).map_err(|e| Error::store(&self.name, e))?;
        tmp.as_file().sync_all().map_err(|e| Error::store(&self.name, e))?;
        tmp.persist(path).map_err(|e| Error::store(&self.name, e.error))?;
        Ok(())
    }
}

impl VectorStore for FileStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension.lock().ok().and_then(|d| *d)
    }

    fn put(&self, record: DocumentRecord) -> Result<()> {
        check_record(&self.name, &record)?;
        // Held across the write so the first put establishes the dimension
        // only if it actually lands.
        let mut established = self.dimension.lock().map_err(|_| Error::store(&self.name, "dimension lock poisoned"))?;
        if let Some(expected) = *established {
            if expected != record.dimension() {
                return Err(Error::dimension(&self.name, expected, record.dimension()));
            }
        }
        let path = self.record_path(&record.id);
        self.write_atomically(&path, &record)?;
        *established = Some(record.dimension());
        debug!(store = %self.name, id = %record.id, "stored record");
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let path = self.record_path(id);
        match fs::metadata(&path) {
            Ok(_) => self.read_record(&path).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::store(&self.name, e)),
        }
    }

    fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.record_path(id).is_file())
    }

    fn remove(&self, id: &str) -> Result<bool> {
        match fs::remove_file(self.record_path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::store(&self.name, e)),
        }
    }

    fn get_all(&self) -> Result<RecordIter<'_>> {
        let paths = self.record_paths()?;
        Ok(Box::new(paths.into_iter().map(move |path| self.read_record(&path))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, embedding: Vec<f32>) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            source: format!("{id}.txt"),
            text: "some text".to_string(),
            embedding,
            language: "en".to_string(),
            provider: "fake:test".to_string(),
        }
    }

    #[test]
    fn ids_with_path_characters_stay_inside_the_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        store.put(record("../escape/me", vec![1.0])).unwrap();
        store.put(record(".hidden", vec![1.0])).unwrap();
        assert!(store.exists("../escape/me").unwrap());
        assert!(store.exists(".hidden").unwrap());
        assert_eq!(store.get_all().unwrap().count(), 2);
        assert!(!tmp.path().parent().unwrap().join("escape").exists());
    }

    #[test]
    fn non_finite_embeddings_never_reach_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        store.put(record("good", vec![1.0, 0.0])).unwrap();
        for bad in [vec![f32::NAN, 0.0], vec![0.0, f32::NEG_INFINITY]] {
            assert!(matches!(store.put(record("bad", bad)), Err(Error::Store { .. })));
        }
        assert!(!store.exists("bad").unwrap());
        let all: Vec<DocumentRecord> = store.get_all().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "good");
    }

    #[test]
    fn plain_ids_keep_readable_file_names() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        store.put(record("cv_en_001", vec![1.0])).unwrap();
        assert!(tmp.path().join("cv_en_001.json").is_file());
    }

    #[test]
    fn hidden_and_foreign_files_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(".tmpXYZ"), b"partial").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"hello").unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        assert_eq!(store.get_all().unwrap().count(), 0);
        assert_eq!(store.dimension(), None);
    }

    #[test]
    fn corrupt_file_is_reported_with_location() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        store.put(record("good", vec![1.0, 2.0])).unwrap();
        fs::write(tmp.path().join("bad.json"), b"{ not json").unwrap();
        let results: Vec<_> = store.get_all().unwrap().collect();
        let err = results.into_iter().find_map(std::result::Result::err).unwrap();
        match err {
            Error::Corrupt { location, .. } => assert!(location.ends_with("bad.json")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn remove_reports_presence() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        store.put(record("a", vec![1.0])).unwrap();
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert!(store.get("a").unwrap().is_none());
    }

    #[test]
    fn empty_embedding_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        assert!(store.put(record("a", Vec::new())).is_err());
        assert_eq!(store.dimension(), None);
    }
}
