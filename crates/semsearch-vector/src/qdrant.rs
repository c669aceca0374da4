//! Hosted vector index over the Qdrant REST API.
//!
//! Points are keyed by a UUID derived from the document id, so re-ingesting
//! a document overwrites its point. The original id travels in the payload
//! next to the text and metadata. Similarity search runs server-side with
//! the collection's cosine distance.

use std::collections::VecDeque;

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use semsearch_core::config::StoreSettings;
use semsearch_core::error::{Error, Result};
use semsearch_core::traits::{validate_dimension, RecordIter, VectorStore};
use semsearch_core::types::{DocumentRecord, Scored};
use semsearch_embed::http::{key_header, trim_base_url, JsonClient};

use crate::check_record;

const SCROLL_PAGE: usize = 256;

#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct CollectionInfo {
    config: CollectionConfig,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: Value,
}

#[derive(Serialize, Deserialize)]
struct Payload {
    id: String,
    filename: String,
    content: String,
    language: String,
    #[serde(default)]
    provider: String,
}

#[derive(Deserialize)]
struct Point {
    id: Value,
    #[serde(default)]
    payload: Option<Payload>,
    #[serde(default)]
    vector: Option<Vec<f32>>,
    #[serde(default)]
    score: Option<f64>,
}

#[derive(Deserialize)]
struct ScrollPage {
    points: Vec<Point>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

pub struct QdrantStore {
    http: JsonClient,
    base: String,
    collection: String,
    name: String,
    dimension: usize,
}

/// Deterministic point id for a document id.
pub fn point_id(id: &str) -> String {
    let hash = blake3::hash(id.as_bytes());
    let b = &hash.as_bytes()[..16];
    let hex: String = b.iter().map(|byte| format!("{byte:02x}")).collect();
    format!("{}-{}-{}-{}-{}", &hex[0..8], &hex[8..12], &hex[12..16], &hex[16..20], &hex[20..32])
}

impl QdrantStore {
    /// Connect and make sure the collection exists with `dimension`-length
    /// cosine vectors. An existing collection of another size is rejected.
    pub fn open(settings: &StoreSettings, dimension: usize) -> Result<Self> {
        let name = format!("qdrant:{}", settings.collection);
        let headers = match settings.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => key_header(&name, "api-key", key)?,
            None => HeaderMap::new(),
        };
        let store = Self {
            http: JsonClient::new(&name, settings.timeout(), headers)?,
            base: trim_base_url(&settings.url),
            collection: settings.collection.clone(),
            name,
            dimension,
        };
        store.ensure_collection()?;
        Ok(store)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/collections/{}{path}", self.base, self.collection)
    }

    fn ensure_collection(&self) -> Result<()> {
        let existing: Option<Envelope<CollectionInfo>> = self.http.send_optional(self.http.get(&self.url("")))?;
        match existing {
            Some(info) => {
                let size = info.result.config.params.vectors.get("size").and_then(Value::as_u64);
                match size {
                    Some(size) if usize::try_from(size).ok() == Some(self.dimension) => Ok(()),
                    Some(size) => Err(Error::dimension(&self.name, self.dimension, usize::try_from(size).unwrap_or(usize::MAX))),
                    None => Err(Error::store(&self.name, "collection uses named vectors, expected a single unnamed vector")),
                }
            }
            None => {
                let body = json!({ "vectors": { "size": self.dimension, "distance": "Cosine" } });
                let _: Envelope<Value> = self.http.send(self.http.put(&self.url("")).json(&body))?;
                info!(collection = %self.collection, dimension = self.dimension, "created qdrant collection");
                Ok(())
            }
        }
    }

    fn to_record(&self, point: Point) -> Result<DocumentRecord> {
        let location = point.id.to_string();
        let corrupt = |cause: &str| Error::Corrupt {
            component: self.name.clone(),
            location: location.clone(),
            cause: cause.to_string(),
        };
        let payload = point.payload.ok_or_else(|| corrupt("point has no payload"))?;
        let embedding = point.vector.ok_or_else(|| corrupt("point has no vector"))?;
        Ok(DocumentRecord {
            id: payload.id,
            source: payload.filename,
            text: payload.content,
            embedding,
            language: payload.language,
            provider: payload.provider,
        })
    }

    fn scroll(&self, offset: Option<Value>) -> Result<ScrollPage> {
        let mut body = json!({ "limit": SCROLL_PAGE, "with_payload": true, "with_vector": true });
        if let Some(offset) = offset {
            body["offset"] = offset;
        }
        let page: Envelope<ScrollPage> = self.http.send(self.http.post(&self.url("/points/scroll")).json(&body))?;
        Ok(page.result)
    }
}

impl VectorStore for QdrantStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }

    fn put(&self, record: DocumentRecord) -> Result<()> {
        check_record(&self.name, &record)?;
        validate_dimension(&self.name, self.dimension, &record.embedding)?;
        let body = json!({
            "points": [{
                "id": point_id(&record.id),
                "vector": record.embedding,
                "payload": Payload {
                    id: record.id.clone(),
                    filename: record.source,
                    content: record.text,
                    language: record.language,
                    provider: record.provider,
                },
            }]
        });
        let _: Envelope<Value> = self.http.send(self.http.put(&self.url("/points?wait=true")).json(&body))?;
        debug!(store = %self.name, id = %record.id, "upserted point");
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let found: Option<Envelope<Point>> =
            self.http.send_optional(self.http.get(&self.url(&format!("/points/{}", point_id(id)))))?;
        found.map(|envelope| self.to_record(envelope.result)).transpose()
    }

    fn exists(&self, id: &str) -> Result<bool> {
        let body = json!({ "ids": [point_id(id)], "with_payload": false, "with_vector": false });
        let found: Envelope<Vec<Value>> = self.http.send(self.http.post(&self.url("/points")).json(&body))?;
        Ok(!found.result.is_empty())
    }

    fn remove(&self, id: &str) -> Result<bool> {
        if !self.exists(id)? {
            return Ok(false);
        }
        let body = json!({ "points": [point_id(id)] });
        let _: Envelope<Value> = self.http.send(self.http.post(&self.url("/points/delete?wait=true")).json(&body))?;
        Ok(true)
    }

    fn get_all(&self) -> Result<RecordIter<'_>> {
        Ok(Box::new(Scroll { store: self, buffer: VecDeque::new(), next: None, done: false }))
    }

    fn nearest(&self, query: &[f32], top_k: usize) -> Result<Option<Vec<Scored<DocumentRecord>>>> {
        validate_dimension(&self.name, self.dimension, query)?;
        let body = json!({ "vector": query, "limit": top_k, "with_payload": true, "with_vector": true });
        let hits: Envelope<Vec<Point>> = self.http.send(self.http.post(&self.url("/points/search")).json(&body))?;
        hits.result
            .into_iter()
            .map(|point| {
                let score = point.score.unwrap_or(0.0);
                self.to_record(point).map(|item| Scored { item, score })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }
}

/// Paged scan: one scroll request per `SCROLL_PAGE` points, on demand.
struct Scroll<'a> {
    store: &'a QdrantStore,
    buffer: VecDeque<Point>,
    next: Option<Value>,
    done: bool,
}

impl Iterator for Scroll<'_> {
    type Item = Result<DocumentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.done {
            match self.store.scroll(self.next.take()) {
                Ok(page) => {
                    self.buffer.extend(page.points);
                    self.next = page.next_page_offset.filter(|v| !v.is_null());
                    self.done = self.next.is_none();
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        self.buffer.pop_front().map(|point| self.store.to_record(point))
    }
}
