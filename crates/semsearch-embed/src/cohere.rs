//! Cohere embeddings and reranking.
//!
//! Cohere encodes asymmetrically: documents with `input_type=search_document`,
//! queries with `input_type=search_query`.

use serde::{Deserialize, Serialize};

use semsearch_core::config::{ProviderSettings, RerankerSettings};
use semsearch_core::error::{Error, Result};
use semsearch_core::traits::{validate_embedding, EmbeddingProvider, Reranker};

use crate::http::{bearer_headers, trim_base_url, JsonClient};
use crate::{ensure_text, require_api_key, single_embedding};

pub const API_KEY_ENV: &str = "COHERE_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.cohere.com";
pub const DEFAULT_EMBED_MODEL: &str = "embed-english-v3.0";
pub const DEFAULT_RERANK_MODEL: &str = "rerank-english-v3.0";

fn known_dimension(model: &str) -> Option<usize> {
    match model {
        "embed-english-v3.0" | "embed-multilingual-v3.0" => Some(1024),
        "embed-english-light-v3.0" | "embed-multilingual-light-v3.0" => Some(384),
        _ => None,
    }
}

#[derive(Clone, Copy)]
enum InputType {
    Document,
    Query,
}

impl InputType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Document => "search_document",
            Self::Query => "search_query",
        }
    }
}

pub struct CohereEmbedder {
    http: JsonClient,
    endpoint: String,
    model: String,
    tag: String,
    dimension: usize,
}

impl CohereEmbedder {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        let model = settings.model.clone().unwrap_or_else(|| DEFAULT_EMBED_MODEL.to_string());
        let tag = format!("cohere:{model}");
        let api_key = require_api_key(&tag, settings.resolve_api_key(API_KEY_ENV), API_KEY_ENV)?;
        let dimension = settings
            .dimension
            .or_else(|| known_dimension(&model))
            .ok_or_else(|| Error::configuration(&tag, "dimension must be set for this model"))?;
        let base = settings.endpoint.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let http = JsonClient::new(&tag, settings.timeout(), bearer_headers(&tag, &api_key)?)?;
        Ok(Self { http, endpoint: format!("{}/v1/embed", trim_base_url(base)), model, tag, dimension })
    }

    fn embed(&self, text: &str, input_type: InputType) -> Result<Vec<f32>> {
        ensure_text(&self.tag, text)?;
        let request = EmbedRequest { texts: [text], model: &self.model, input_type: input_type.as_str() };
        tracing::debug!(provider = %self.tag, input_type = input_type.as_str(), "embed request");
        let response: EmbedResponse = self.http.send(self.http.post(&self.endpoint).json(&request))?;
        let vector = single_embedding(&self.tag, response.embeddings)?;
        validate_embedding(&self.tag, self.dimension, &vector)?;
        Ok(vector)
    }
}

impl EmbeddingProvider for CohereEmbedder {
    fn tag(&self) -> &str { &self.tag }
    fn dimension(&self) -> usize { self.dimension }
    fn embed_document(&self, text: &str) -> Result<Vec<f32>> { self.embed(text, InputType::Document) }
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> { self.embed(text, InputType::Query) }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: [&'a str; 1],
    model: &'a str,
    input_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct CohereReranker {
    http: JsonClient,
    endpoint: String,
    model: String,
    name: String,
}

impl CohereReranker {
    pub fn from_settings(settings: &RerankerSettings) -> Result<Self> {
        let model = settings.model.clone().unwrap_or_else(|| DEFAULT_RERANK_MODEL.to_string());
        let name = format!("cohere:{model}");
        let api_key = require_api_key(&name, settings.resolve_api_key(API_KEY_ENV), API_KEY_ENV)?;
        let base = settings.endpoint.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let http = JsonClient::new(&name, settings.timeout(), bearer_headers(&name, &api_key)?)?;
        Ok(Self { http, endpoint: format!("{}/v1/rerank", trim_base_url(base)), model, name })
    }

    fn request_scores(&self, query: &str, documents: &[&str]) -> Result<Vec<f64>> {
        let request = RerankRequest { model: &self.model, query, documents, top_n: documents.len() };
        tracing::debug!(reranker = %self.name, candidates = documents.len(), "rerank request");
        let response: RerankResponse = self.http.send(self.http.post(&self.endpoint).json(&request))?;
        scores_by_index(&self.name, documents.len(), response.results)
    }
}

impl Reranker for CohereReranker {
    fn name(&self) -> &str { &self.name }

    fn rerank(&self, query: &str, documents: &[&str]) -> Result<Vec<f64>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        self.request_scores(query, documents).map_err(|e| match e {
            Error::RerankFailure { .. } => e,
            other => Error::rerank(&self.name, other),
        })
    }
}

/// Put `results` back into input order; every index must appear exactly once.
fn scores_by_index(component: &str, expected: usize, results: Vec<RerankResult>) -> Result<Vec<f64>> {
    let mut scores: Vec<Option<f64>> = vec![None; expected];
    for r in results {
        let slot = scores
            .get_mut(r.index)
            .ok_or_else(|| Error::rerank(component, format!("result index {} out of range", r.index)))?;
        if slot.replace(r.relevance_score).is_some() {
            return Err(Error::rerank(component, format!("duplicate result index {}", r.index)));
        }
    }
    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.ok_or_else(|| Error::rerank(component, format!("no score for candidate {i}"))))
        .collect()
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [&'a str],
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f64,
}
