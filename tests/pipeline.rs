//! End-to-end tests: structure, index from JSON, answer

mod common;

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use common::{hit, MockIndex, SAMPLE_STANDARD};
use compliance_rag::config::Config;
use compliance_rag::document::StructuredDocumentBuilder;
use compliance_rag::errors::{RagError, Result};
use compliance_rag::index::{open_index, SearchFilter, VectorIndex};
use compliance_rag::llm::Generator;
use compliance_rag::rag::pipeline::{APOLOGY_MESSAGE, INDEX_UNAVAILABLE_MESSAGE};
use compliance_rag::rag::{RagPipeline, SearchStrategy};

#[derive(Default)]
struct RecordingGenerator {
    prompts: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(RagError::Upstream("model offline".to_string()));
        }
        Ok("Per PCI DSS v4.0 requirement 8.3, strong authentication is required.".to_string())
    }
}

fn config_for(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.paths.structured_json = dir.path().join("pci.json");
    config
}

#[tokio::test]
async fn test_structure_index_and_answer() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = config_for(&dir);
    StructuredDocumentBuilder::new()
        .build("pci.txt", SAMPLE_STANDARD)
        .write_json(&config.paths.structured_json)
        .unwrap();

    let generator = Arc::new(RecordingGenerator::default());
    let index = open_index(&config).await;
    assert!(index.is_some());
    let pipeline = RagPipeline::from_config(&config, index, generator.clone());

    let outcome = pipeline.context("Explain requirement 8.3").await.unwrap();
    assert_eq!(outcome.strategy, SearchStrategy::ExactReference);

    let answer = pipeline.answer("Explain requirement 8.3").await;
    assert!(answer.starts_with("Per PCI DSS v4.0 requirement 8.3"));

    let prompts = generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("[subrequirement 8.3] (PCI DSS v4.0)"));
    assert!(prompts[0].contains("Something you have"));
}

#[tokio::test]
async fn test_empty_index_returns_topic_fallback_without_generation() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = config_for(&dir);
    StructuredDocumentBuilder::new()
        .build("empty.txt", "no headers here")
        .write_json(&config.paths.structured_json)
        .unwrap();

    let generator = Arc::new(RecordingGenerator::default());
    let pipeline = RagPipeline::from_config(&config, open_index(&config).await, generator.clone());

    let answer = pipeline.answer("What about database backups?").await;
    assert!(answer.starts_with("General best practices for secure data storage"));
    assert!(generator.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_json_means_index_not_ready() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = config_for(&dir);

    let pipeline = RagPipeline::from_config(
        &config,
        open_index(&config).await,
        Arc::new(RecordingGenerator::default()),
    );
    assert_eq!(pipeline.answer("requirement 3").await, INDEX_UNAVAILABLE_MESSAGE);
}

#[tokio::test]
async fn test_generation_failure_returns_apology() {
    let index = Arc::new(MockIndex::new().on_filter(
        SearchFilter::new().with("number", "3").with("type", "requirement"),
        vec![hit("requirement", "3", "3: Protect stored account data")],
    ));
    let generator = Arc::new(RecordingGenerator {
        fail: true,
        ..Default::default()
    });
    let pipeline = RagPipeline::from_config(
        &Config::default(),
        Some(index as Arc<dyn VectorIndex>),
        generator.clone(),
    );

    assert_eq!(pipeline.answer("requirement 3").await, APOLOGY_MESSAGE);
    assert_eq!(generator.prompts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_index_failure_returns_apology() {
    let index = Arc::new(MockIndex::failing("qdrant returned 500"));
    let pipeline = RagPipeline::from_config(
        &Config::default(),
        Some(index as Arc<dyn VectorIndex>),
        Arc::new(RecordingGenerator::default()),
    );

    assert_eq!(pipeline.answer("what is a QSA").await, APOLOGY_MESSAGE);
}
