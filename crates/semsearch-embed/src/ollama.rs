//! Local Ollama server. Needs an endpoint, never a credential.

use serde::{Deserialize, Serialize};

use reqwest::header::HeaderMap;
use semsearch_core::config::ProviderSettings;
use semsearch_core::error::{Error, Result};
use semsearch_core::traits::{validate_embedding, EmbeddingProvider};

use crate::ensure_text;
use crate::http::{trim_base_url, JsonClient};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "nomic-embed-text";

fn known_dimension(model: &str) -> Option<usize> {
    match model.split(':').next().unwrap_or(model) {
        "nomic-embed-text" => Some(768),
        "mxbai-embed-large" => Some(1024),
        "all-minilm" => Some(384),
        _ => None,
    }
}

pub struct OllamaEmbedder {
    http: JsonClient,
    endpoint: String,
    model: String,
    tag: String,
    dimension: usize,
}

impl OllamaEmbedder {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        let model = settings.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let tag = format!("ollama:{model}");
        let base = trim_base_url(settings.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT));
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::configuration(&tag, "endpoint must be an http(s) URL"));
        }
        let dimension = settings
            .dimension
            .or_else(|| known_dimension(&model))
            .ok_or_else(|| Error::configuration(&tag, "dimension must be set for this model"))?;
        let http = JsonClient::new(&tag, settings.timeout(), HeaderMap::new())?;
        Ok(Self { http, endpoint: format!("{base}/api/embeddings"), model, tag, dimension })
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        ensure_text(&self.tag, text)?;
        tracing::debug!(provider = %self.tag, "embed request");
        let request = EmbeddingsRequest { model: &self.model, prompt: text };
        let response: EmbeddingsResponse = self.http.send(self.http.post(&self.endpoint).json(&request))?;
        validate_embedding(&self.tag, self.dimension, &response.embedding)?;
        Ok(response.embedding)
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    fn tag(&self) -> &str { &self.tag }
    fn dimension(&self) -> usize { self.dimension }
    fn embed_document(&self, text: &str) -> Result<Vec<f32>> { self.embed(text) }
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> { self.embed(text) }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}
