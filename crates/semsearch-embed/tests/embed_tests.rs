use semsearch_core::config::{ProviderKind, ProviderSettings};
use semsearch_core::error::Error;
use semsearch_core::traits::EmbeddingProvider;
use semsearch_embed::{FakeEmbedder, Provider};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    let embedder = FakeEmbedder::new(128);
    let v1 = embedder.embed_document("hello world").expect("embed");
    let v2 = embedder.embed_query("hello world").expect("embed");

    assert_eq!(v1.len(), 128, "embedding dim is 128");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn fake_embedder_puts_shared_words_closer() {
    let embedder = FakeEmbedder::new(256);
    let q = embedder.embed_query("android kotlin engineer").unwrap();
    let near = embedder.embed_document("senior android engineer with kotlin").unwrap();
    let far = embedder.embed_document("pastry chef croissants").unwrap();
    assert!(cosine(&q, &near) > cosine(&q, &far));
}

#[test]
fn empty_text_is_rejected_before_embedding() {
    let embedder = FakeEmbedder::new(8);
    assert!(matches!(embedder.embed_query("   "), Err(Error::ProviderRequest { .. })));
}

#[test]
fn missing_credential_only_fails_that_provider() {
    let mut openai = ProviderSettings::new(ProviderKind::OpenAi);
    openai.api_key_env = Some("SEMSEARCH_TEST_MISSING_OPENAI_KEY".into());
    let err = Provider::from_settings(&openai).err().expect("must fail without key");
    assert!(matches!(err, Error::Configuration { .. }));
    assert_eq!(err.component(), "openai:text-embedding-3-small");

    let mut fake = ProviderSettings::new(ProviderKind::Fake);
    fake.dimension = Some(16);
    let provider = Provider::from_settings(&fake).expect("fake provider builds");
    assert_eq!(provider.dimension(), 16);
    assert_eq!(provider.embed_query("still usable").unwrap().len(), 16);

    let ollama = Provider::from_settings(&ProviderSettings::new(ProviderKind::Ollama)).expect("ollama builds");
    assert_eq!(ollama.tag(), "ollama:nomic-embed-text");
}

#[test]
fn configured_providers_report_default_dimensions() {
    let cases = [
        (ProviderKind::Cohere, 1024, "cohere:embed-english-v3.0"),
        (ProviderKind::OpenAi, 1536, "openai:text-embedding-3-small"),
        (ProviderKind::Gemini, 768, "gemini:embedding-001"),
        (ProviderKind::HuggingFace, 384, "huggingface:sentence-transformers/all-MiniLM-L6-v2"),
    ];
    for (kind, dim, tag) in cases {
        let mut settings = ProviderSettings::new(kind);
        settings.api_key = Some("test-key".into());
        let provider = Provider::from_settings(&settings).expect("builds with inline key");
        assert_eq!(provider.dimension(), dim);
        assert_eq!(provider.tag(), tag);
    }
}
