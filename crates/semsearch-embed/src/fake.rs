//! Deterministic offline embedder.
//!
//! Hashes whitespace tokens into buckets and L2-normalizes the result, so
//! texts sharing words land close together. Used for tests and for running
//! the whole pipeline without network access.

use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

use semsearch_core::config::ProviderSettings;
use semsearch_core::error::{Error, Result};
use semsearch_core::traits::EmbeddingProvider;

use crate::ensure_text;

pub const DEFAULT_DIMENSION: usize = 64;

pub struct FakeEmbedder {
    dim: usize,
    tag: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, tag: format!("fake:xxhash-d{dim}") }
    }

    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        let dim = settings.dimension.unwrap_or(DEFAULT_DIMENSION);
        if dim == 0 {
            return Err(Error::configuration("fake", "dimension must be at least 1"));
        }
        Ok(Self::new(dim))
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        ensure_text(&self.tag, text)?;
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            #[allow(clippy::cast_possible_truncation)]
            let idx = (h % self.dim as u64) as usize;
            #[allow(clippy::cast_precision_loss)]
            let val = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += 0.5 + val;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        Ok(v)
    }
}

impl EmbeddingProvider for FakeEmbedder {
    fn tag(&self) -> &str { &self.tag }
    fn dimension(&self) -> usize { self.dim }
    fn embed_document(&self, text: &str) -> Result<Vec<f32>> { self.embed(text) }
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> { self.embed(text) }
}
