//! OpenAI-compatible embeddings client. Documents and queries share one encoding.

use serde::{Deserialize, Serialize};

use semsearch_core::config::ProviderSettings;
use semsearch_core::error::{Error, Result};
use semsearch_core::traits::{validate_embedding, EmbeddingProvider};

use crate::http::{bearer_headers, trim_base_url, JsonClient};
use crate::{ensure_text, require_api_key, single_embedding};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

fn known_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

pub struct OpenAiEmbedder {
    http: JsonClient,
    endpoint: String,
    model: String,
    tag: String,
    dimension: usize,
    /// Sent as `dimensions` only when the dimension was configured explicitly.
    requested_dimensions: Option<usize>,
}

impl OpenAiEmbedder {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        let model = settings.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let tag = format!("openai:{model}");
        let api_key = require_api_key(&tag, settings.resolve_api_key(API_KEY_ENV), API_KEY_ENV)?;
        let dimension = settings
            .dimension
            .or_else(|| known_dimension(&model))
            .ok_or_else(|| Error::configuration(&tag, "dimension must be set for this model"))?;
        let base = settings.endpoint.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let http = JsonClient::new(&tag, settings.timeout(), bearer_headers(&tag, &api_key)?)?;
        Ok(Self {
            http,
            endpoint: format!("{}/embeddings", trim_base_url(base)),
            model,
            tag,
            dimension,
            requested_dimensions: settings.dimension,
        })
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        ensure_text(&self.tag, text)?;
        let request = EmbeddingRequest { model: &self.model, input: [text], dimensions: self.requested_dimensions };
        tracing::debug!(provider = %self.tag, "embed request");
        let mut parsed: EmbeddingResponse = self.http.send(self.http.post(&self.endpoint).json(&request))?;
        parsed.data.sort_by_key(|entry| entry.index);
        let vector = single_embedding(&self.tag, parsed.data.into_iter().map(|d| d.embedding).collect())?;
        validate_embedding(&self.tag, self.dimension, &vector)?;
        Ok(vector)
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    fn tag(&self) -> &str { &self.tag }
    fn dimension(&self) -> usize { self.dimension }
    fn embed_document(&self, text: &str) -> Result<Vec<f32>> { self.embed(text) }
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> { self.embed(text) }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_omitted_unless_configured() {
        let request = EmbeddingRequest { model: DEFAULT_MODEL, input: ["q"], dimensions: None };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("dimensions").is_none());
        assert_eq!(json["input"][0], "q");
    }

    #[test]
    fn response_parses() {
        let json = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.1,0.2]}],"model":"text-embedding-3-small"}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2]);
    }
}
