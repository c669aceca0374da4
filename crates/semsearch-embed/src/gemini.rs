//! Google Gemini `embedContent`.
//!
//! Documents are sent with `taskType=RETRIEVAL_DOCUMENT` and queries with
//! `RETRIEVAL_QUERY`.

use serde::{Deserialize, Serialize};

use semsearch_core::config::ProviderSettings;
use semsearch_core::error::{Error, Result};
use semsearch_core::traits::{validate_embedding, EmbeddingProvider};

use crate::http::{key_header, trim_base_url, JsonClient};
use crate::{ensure_text, require_api_key};

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "embedding-001";

fn known_dimension(model: &str) -> Option<usize> {
    match model {
        "embedding-001" | "text-embedding-004" => Some(768),
        _ => None,
    }
}

pub struct GeminiEmbedder {
    http: JsonClient,
    endpoint: String,
    model_path: String,
    tag: String,
    dimension: usize,
}

impl GeminiEmbedder {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        let model = settings.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let tag = format!("gemini:{model}");
        let api_key = require_api_key(&tag, settings.resolve_api_key(API_KEY_ENV), API_KEY_ENV)?;
        let dimension = settings
            .dimension
            .or_else(|| known_dimension(&model))
            .ok_or_else(|| Error::configuration(&tag, "dimension must be set for this model"))?;
        let base = settings.endpoint.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let model_path = format!("models/{model}");
        let endpoint = format!("{}/v1beta/{model_path}:embedContent", trim_base_url(base));
        let http = JsonClient::new(&tag, settings.timeout(), key_header(&tag, "x-goog-api-key", &api_key)?)?;
        Ok(Self { http, endpoint, model_path, tag, dimension })
    }

    fn embed(&self, text: &str, task_type: &'static str) -> Result<Vec<f32>> {
        ensure_text(&self.tag, text)?;
        let request = EmbedContentRequest {
            model: &self.model_path,
            content: Content { parts: [Part { text }] },
            task_type,
        };
        tracing::debug!(provider = %self.tag, task_type, "embed request");
        let response: EmbedContentResponse = self.http.send(self.http.post(&self.endpoint).json(&request))?;
        let vector = response.embedding.values;
        validate_embedding(&self.tag, self.dimension, &vector)?;
        Ok(vector)
    }
}

impl EmbeddingProvider for GeminiEmbedder {
    fn tag(&self) -> &str { &self.tag }
    fn dimension(&self) -> usize { self.dimension }
    fn embed_document(&self, text: &str) -> Result<Vec<f32>> { self.embed(text, "RETRIEVAL_DOCUMENT") }
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> { self.embed(text, "RETRIEVAL_QUERY") }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}
