//! Embedding providers and rerankers.
//!
//! Provider choice is made once, from configuration, by building a
//! [`Provider`]. Callers hold it (or any other [`EmbeddingProvider`]) by handle;
//! there is no global client state.

pub mod cohere;
pub mod fake;
pub mod gemini;
pub mod http;
pub mod huggingface;
pub mod ollama;
pub mod openai;

use semsearch_core::config::{ProviderKind, ProviderSettings, RerankerKind, RerankerSettings};
use semsearch_core::error::{Error, Result};
use semsearch_core::traits::{EmbeddingProvider, Reranker};

pub use cohere::{CohereEmbedder, CohereReranker};
pub use fake::FakeEmbedder;
pub use gemini::GeminiEmbedder;
pub use huggingface::HuggingFaceEmbedder;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;

/// The closed set of embedding backends.
pub enum Provider {
    Cohere(CohereEmbedder),
    OpenAi(OpenAiEmbedder),
    Gemini(GeminiEmbedder),
    HuggingFace(HuggingFaceEmbedder),
    Ollama(OllamaEmbedder),
    Fake(FakeEmbedder),
}

impl Provider {
    /// Build the provider described by `settings`.
    ///
    /// A missing credential fails only this provider with `Configuration`.
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        let provider = match settings.kind {
            ProviderKind::Cohere => Self::Cohere(CohereEmbedder::from_settings(settings)?),
            ProviderKind::OpenAi => Self::OpenAi(OpenAiEmbedder::from_settings(settings)?),
            ProviderKind::Gemini => Self::Gemini(GeminiEmbedder::from_settings(settings)?),
            ProviderKind::HuggingFace => Self::HuggingFace(HuggingFaceEmbedder::from_settings(settings)?),
            ProviderKind::Ollama => Self::Ollama(OllamaEmbedder::from_settings(settings)?),
            ProviderKind::Fake => Self::Fake(FakeEmbedder::from_settings(settings)?),
        };
        tracing::debug!(provider = provider.tag(), dimension = provider.dimension(), "provider ready");
        Ok(provider)
    }

    fn inner(&self) -> &dyn EmbeddingProvider {
        match self {
            Self::Cohere(p) => p,
            Self::OpenAi(p) => p,
            Self::Gemini(p) => p,
            Self::HuggingFace(p) => p,
            Self::Ollama(p) => p,
            Self::Fake(p) => p,
        }
    }
}

impl EmbeddingProvider for Provider {
    fn tag(&self) -> &str { self.inner().tag() }
    fn dimension(&self) -> usize { self.inner().dimension() }
    fn embed_document(&self, text: &str) -> Result<Vec<f32>> { self.inner().embed_document(text) }
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> { self.inner().embed_query(text) }
}

pub fn build_reranker(settings: &RerankerSettings) -> Result<Box<dyn Reranker>> {
    match settings.kind {
        RerankerKind::Cohere => Ok(Box::new(CohereReranker::from_settings(settings)?)),
    }
}

pub(crate) fn ensure_text(component: &str, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        Err(Error::request(component, "input text is empty"))
    } else {
        Ok(())
    }
}

pub(crate) fn require_api_key(component: &str, key: Option<String>, env_name: &str) -> Result<String> {
    key.ok_or_else(|| Error::configuration(component, format!("API key not configured (set api_key or {env_name})")))
}

/// The one vector of a single-input batch response.
pub(crate) fn single_embedding(component: &str, mut embeddings: Vec<Vec<f32>>) -> Result<Vec<f32>> {
    if embeddings.len() != 1 {
        return Err(Error::request(component, format!("expected 1 embedding, got {}", embeddings.len())));
    }
    Ok(embeddings.remove(0))
}
