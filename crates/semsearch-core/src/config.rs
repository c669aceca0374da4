//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys split on `__`, e.g. `APP_PROVIDERS__OPENAI__MODEL`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const COMPONENT: &str = "config";

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Load from the current directory.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(base: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(base.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base.join("config.test.toml"))),
            other => tracing::debug!(env = other, "no environment overlay for RUST_ENV"),
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn from_toml_str(toml: &str) -> Self {
        Self { figment: Figment::new().merge(Toml::string(toml)) }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::configuration(COMPONENT, format!("failed to get '{key}': {e}")))
    }

    /// The whole typed settings tree, with defaults for absent sections.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::configuration(COMPONENT, e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub providers: BTreeMap<String, ProviderSettings>,
    pub store: StoreSettings,
    pub reranker: Option<RerankerSettings>,
    pub search: SearchSettings,
    pub ingest: IngestSettings,
}

impl Settings {
    pub fn provider(&self, name: &str) -> Result<&ProviderSettings> {
        self.providers
            .get(name)
            .ok_or_else(|| Error::configuration(name, "no such provider configured"))
    }

    /// Store settings for `provider`: its own section if present, else the
    /// default section with file stores rooted at `<root>/<provider>`.
    pub fn store_for(&self, provider: &str) -> StoreSettings {
        if let Some(own) = self.providers.get(provider).and_then(|p| p.store.clone()) {
            return own;
        }
        let mut store = self.store.clone();
        if store.path.is_none() {
            store.path = Some(store.root.join(provider));
        }
        store
    }

    fn validate(&self) -> Result<()> {
        if self.search.candidate_multiplier == 0 {
            return Err(Error::configuration(COMPONENT, "search.candidate_multiplier must be at least 1"));
        }
        if self.ingest.concurrency == 0 {
            return Err(Error::configuration(COMPONENT, "ingest.concurrency must be at least 1"));
        }
        if self.ingest.max_retries == 0 {
            return Err(Error::configuration(COMPONENT, "ingest.max_retries must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Cohere,
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
    #[serde(rename = "huggingface")]
    HuggingFace,
    Ollama,
    Fake,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub dimension: Option<usize>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub store: Option<StoreSettings>,
}

impl ProviderSettings {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            model: None,
            api_key: None,
            api_key_env: None,
            endpoint: None,
            dimension: None,
            timeout_secs: default_timeout_secs(),
            store: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn resolve_api_key(&self, default_env: &str) -> Option<String> {
        resolve_secret(self.api_key.as_deref(), self.api_key_env.as_deref().unwrap_or(default_env))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    File,
    Qdrant,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSettings {
    pub kind: StoreKind,
    /// Parent directory for per-provider file stores.
    pub root: PathBuf,
    /// Exact directory of a file store; overrides `root`.
    pub path: Option<PathBuf>,
    pub url: String,
    pub collection: String,
    pub api_key: Option<String>,
    /// Serve reads from a load-once in-memory copy.
    pub cache: bool,
    pub timeout_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            kind: StoreKind::File,
            root: PathBuf::from("data/embeddings"),
            path: None,
            url: "http://localhost:6333".to_string(),
            collection: "cv_search".to_string(),
            api_key: None,
            cache: true,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl StoreSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RerankerKind {
    Cohere,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RerankerSettings {
    pub kind: RerankerKind,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RerankerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn resolve_api_key(&self, default_env: &str) -> Option<String> {
        resolve_secret(self.api_key.as_deref(), self.api_key_env.as_deref().unwrap_or(default_env))
    }
}

/// What a query does when the provider or store fails before reranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    #[default]
    Fail,
    /// Log the failure and answer with an empty result list.
    Empty,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchSettings {
    pub top_k: usize,
    pub candidate_multiplier: usize,
    pub candidate_floor: usize,
    pub on_error: ErrorPolicy,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { top_k: 5, candidate_multiplier: 4, candidate_floor: 20, on_error: ErrorPolicy::Fail }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestSettings {
    pub corpus_dir: PathBuf,
    pub concurrency: usize,
    pub max_retries: usize,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub reembed_changed: bool,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("data/cvs"),
            concurrency: 4,
            max_retries: 5,
            base_backoff_ms: 500,
            max_backoff_ms: 30_000,
            reembed_changed: false,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn resolve_secret(inline: Option<&str>, env_name: &str) -> Option<String> {
    inline
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .or_else(|| env::var(env_name).ok().filter(|s| !s.trim().is_empty()))
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
