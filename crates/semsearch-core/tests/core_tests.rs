use std::fs;
use std::io::Write;
use tempfile::TempDir;

use semsearch_core::config::{Config, ErrorPolicy, ProviderKind, StoreKind};
use semsearch_core::corpus::{count_corpus_dir, load_corpus_dir};
use semsearch_core::error::Error;
use semsearch_core::traits::{first_non_finite, validate_embedding};

#[test]
fn load_corpus_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let file_path = dir.join("cv_en_001.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Senior iOS engineer, Swift and SwiftUI").unwrap();

    let entries = load_corpus_dir(dir).expect("load");

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, "cv_en_001");
    assert_eq!(entries[0].source, "cv_en_001.txt");
    assert_eq!(entries[0].language, "en");
    assert_eq!(entries[0].text.trim(), "Senior iOS engineer, Swift and SwiftUI");
}

#[test]
fn load_corpus_ignores_other_extensions_and_sorts() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("b_de_2.txt"), "charlie delta").unwrap();
    fs::write(dir.join("a_es_1.txt"), "alpha bravo").unwrap();
    fs::write(dir.join("notes.md"), "skip me").unwrap();
    fs::create_dir(dir.join("nested")).unwrap();
    fs::write(dir.join("nested").join("c_pt_3.txt"), "echo").unwrap();

    let entries = load_corpus_dir(dir).expect("load");
    let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["a_es_1", "b_de_2"]);
    assert_eq!(count_corpus_dir(dir).unwrap(), 2);
}

#[test]
fn same_file_name_in_subdirectories_cannot_collide() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("cv_en_1.txt"), "top level").unwrap();
    for sub in ["a", "b"] {
        fs::create_dir(dir.join(sub)).unwrap();
        fs::write(dir.join(sub).join("cv_en_1.txt"), sub).unwrap();
    }

    let entries = load_corpus_dir(dir).expect("load");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, "cv_en_1");
    assert_eq!(entries[0].text, "top level");
    assert_eq!(count_corpus_dir(dir).unwrap(), 1);
}

#[test]
fn provider_output_must_be_finite() {
    assert!(validate_embedding("openai:small", 2, &[0.5, -0.5]).is_ok());
    assert!(matches!(
        validate_embedding("openai:small", 3, &[0.5, -0.5]),
        Err(Error::DimensionMismatch { expected: 3, actual: 2, .. })
    ));
    for bad in [[f32::NAN, 0.0], [0.0, f32::INFINITY]] {
        let err = validate_embedding("openai:small", 2, &bad).unwrap_err();
        assert!(matches!(err, Error::ProviderRequest { .. }), "{err}");
        assert_eq!(err.component(), "openai:small");
        assert!(!err.is_fatal());
    }
    assert_eq!(first_non_finite(&[1.0, 2.0, f32::NEG_INFINITY]), Some(2));
    assert_eq!(first_non_finite(&[]), None);
}

#[test]
fn missing_corpus_dir_counts_zero_but_fails_to_load() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope");
    assert_eq!(count_corpus_dir(&missing).unwrap(), 0);
    assert!(load_corpus_dir(&missing).is_err());
}

#[test]
fn settings_from_toml_with_defaults() {
    let config = Config::from_toml_str(
        r#"
        [providers.cohere]
        kind = "cohere"

        [providers.local]
        kind = "ollama"
        endpoint = "http://127.0.0.1:11434"

        [providers.local.store]
        kind = "qdrant"
        collection = "cvs_local"

        [search]
        on_error = "empty"
        "#,
    );
    let settings = config.settings().expect("settings");

    assert_eq!(settings.provider("cohere").unwrap().kind, ProviderKind::Cohere);
    assert_eq!(settings.search.top_k, 5);
    assert_eq!(settings.search.candidate_floor, 20);
    assert_eq!(settings.search.on_error, ErrorPolicy::Empty);
    assert_eq!(settings.ingest.concurrency, 4);

    let cohere_store = settings.store_for("cohere");
    assert_eq!(cohere_store.kind, StoreKind::File);
    assert_eq!(cohere_store.path.unwrap(), std::path::PathBuf::from("data/embeddings/cohere"));

    let local_store = settings.store_for("local");
    assert_eq!(local_store.kind, StoreKind::Qdrant);
    assert_eq!(local_store.collection, "cvs_local");

    assert!(settings.provider("missing").is_err());
}

#[test]
fn invalid_settings_are_rejected() {
    let config = Config::from_toml_str("[ingest]\nconcurrency = 0\n");
    assert!(config.settings().is_err());
}

#[test]
fn inline_api_key_wins_over_env() {
    let config = Config::from_toml_str(
        r#"
        [providers.openai]
        kind = "openai"
        api_key = "sk-inline"
        api_key_env = "SEMSEARCH_TEST_UNSET_KEY"
        "#,
    );
    let settings = config.settings().unwrap();
    let openai = settings.provider("openai").unwrap();
    assert_eq!(openai.resolve_api_key("OPENAI_API_KEY").as_deref(), Some("sk-inline"));
}
