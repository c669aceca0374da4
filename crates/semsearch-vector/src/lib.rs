#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Storage and exhaustive retrieval over embedded documents.

pub mod cache;
pub mod file_store;
pub mod ingest;
pub mod memory;
pub mod qdrant;
pub mod retrieval;
pub mod similarity;
pub mod stats;

use std::sync::Arc;

use semsearch_core::config::{expand_path, StoreKind, StoreSettings};
use semsearch_core::error::{Error, Result};
use semsearch_core::traits::{first_non_finite, VectorStore};
use semsearch_core::types::DocumentRecord;

pub use cache::CachedStore;
pub use file_store::FileStore;
pub use ingest::{IngestEvent, IngestFailure, IngestOptions, IngestReport, Ingestor};
pub use memory::MemoryStore;
pub use qdrant::QdrantStore;
pub use retrieval::{retrieve, retrieve_from};
pub use similarity::cosine_similarity;
pub use stats::collect_stats;

/// Open the store described by `settings` for `dimension`-length vectors,
/// behind a read cache when `settings.cache` is set.
pub fn open_store(settings: &StoreSettings, dimension: usize) -> Result<Arc<dyn VectorStore>> {
    match settings.kind {
        StoreKind::File => {
            let dir = settings
                .path
                .clone()
                .unwrap_or_else(|| settings.root.clone());
            let store = FileStore::open_with_dimension(expand_path(dir.to_string_lossy()), dimension)?;
            Ok(if settings.cache { Arc::new(CachedStore::new(store)) } else { Arc::new(store) })
        }
        StoreKind::Qdrant => Ok(Arc::new(QdrantStore::open(settings, dimension)?)),
    }
}

/// Rejects a record no store may hold: an empty id, an empty embedding or a
/// NaN/infinite component. Runs before anything is written.
pub(crate) fn check_record(store: &str, record: &DocumentRecord) -> Result<()> {
    if record.id.is_empty() {
        return Err(Error::store(store, "record id must not be empty"));
    }
    if record.embedding.is_empty() {
        return Err(Error::store(store, format!("record {} has an empty embedding", record.id)));
    }
    if let Some(i) = first_non_finite(&record.embedding) {
        return Err(Error::store(
            store,
            format!("record {} has a non-finite embedding component at {i}", record.id),
        ));
    }
    Ok(())
}
