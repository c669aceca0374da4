//! Hugging Face inference `feature-extraction` pipeline.

use serde::{Deserialize, Serialize};

use semsearch_core::config::ProviderSettings;
use semsearch_core::error::{Error, Result};
use semsearch_core::traits::{validate_embedding, EmbeddingProvider};

use crate::http::{bearer_headers, trim_base_url, JsonClient};
use crate::{ensure_text, require_api_key};

pub const API_KEY_ENV: &str = "HUGGINGFACE_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://router.huggingface.co/hf-inference";
pub const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

fn known_dimension(model: &str) -> Option<usize> {
    match model {
        "sentence-transformers/all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L12-v2" => Some(384),
        "sentence-transformers/all-mpnet-base-v2" => Some(768),
        _ => None,
    }
}

pub struct HuggingFaceEmbedder {
    http: JsonClient,
    endpoint: String,
    tag: String,
    dimension: usize,
}

impl HuggingFaceEmbedder {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        let model = settings.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let tag = format!("huggingface:{model}");
        let api_key = require_api_key(&tag, settings.resolve_api_key(API_KEY_ENV), API_KEY_ENV)?;
        let dimension = settings
            .dimension
            .or_else(|| known_dimension(&model))
            .ok_or_else(|| Error::configuration(&tag, "dimension must be set for this model"))?;
        let base = settings.endpoint.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let endpoint = format!("{}/models/{model}/pipeline/feature-extraction", trim_base_url(base));
        let http = JsonClient::new(&tag, settings.timeout(), bearer_headers(&tag, &api_key)?)?;
        Ok(Self { http, endpoint, tag, dimension })
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        ensure_text(&self.tag, text)?;
        tracing::debug!(provider = %self.tag, "feature-extraction request");
        let output: FeatureOutput = self.http.send(self.http.post(&self.endpoint).json(&FeatureRequest { inputs: text }))?;
        let vector = output.into_vector(&self.tag)?;
        validate_embedding(&self.tag, self.dimension, &vector)?;
        Ok(vector)
    }
}

impl EmbeddingProvider for HuggingFaceEmbedder {
    fn tag(&self) -> &str { &self.tag }
    fn dimension(&self) -> usize { self.dimension }
    fn embed_document(&self, text: &str) -> Result<Vec<f32>> { self.embed(text) }
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> { self.embed(text) }
}

#[derive(Serialize)]
struct FeatureRequest<'a> {
    inputs: &'a str,
}

/// Sentence-transformer models answer with one pooled vector; plain
/// transformer models answer with one vector per token.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureOutput {
    Pooled(Vec<f32>),
    Rows(Vec<Vec<f32>>),
    Batched(Vec<Vec<Vec<f32>>>),
}

impl FeatureOutput {
    fn into_vector(self, component: &str) -> Result<Vec<f32>> {
        let rows = match self {
            Self::Pooled(v) => return non_empty(component, v),
            Self::Rows(rows) => rows,
            Self::Batched(mut batch) => {
                if batch.len() != 1 {
                    return Err(Error::request(component, format!("expected 1 embedding, got {}", batch.len())));
                }
                batch.remove(0)
            }
        };
        if rows.len() == 1 {
            return non_empty(component, rows.into_iter().flatten().collect());
        }
        mean_pool(component, &rows)
    }
}

fn non_empty(component: &str, v: Vec<f32>) -> Result<Vec<f32>> {
    if v.is_empty() {
        Err(Error::request(component, "empty embedding in response"))
    } else {
        Ok(v)
    }
}

fn mean_pool(component: &str, rows: &[Vec<f32>]) -> Result<Vec<f32>> {
    let width = rows.first().map_or(0, Vec::len);
    if width == 0 || rows.iter().any(|r| r.len() != width) {
        return Err(Error::request(component, "ragged token embeddings in response"));
    }
    let mut sum = vec![0f64; width];
    for row in rows {
        for (acc, x) in sum.iter_mut().zip(row) {
            *acc += f64::from(*x);
        }
    }
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let pooled = sum.into_iter().map(|s| (s / rows.len() as f64) as f32).collect();
    Ok(pooled)
}
