//! Index construction from configuration

use anyhow::{Context, Result as AnyResult};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, EmbeddingBackend, EmbeddingConfig, IndexBackend};
use crate::document::builder::flatten;
use crate::document::types::StructuredDocument;
use crate::index::{BertEmbedder, Embedder, HashingEmbedder, InMemoryIndex, QdrantIndex, VectorIndex};

/// Build the configured embedder
pub fn embedder_from_config(config: &EmbeddingConfig) -> AnyResult<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.backend {
        EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::new(config.hashing_dimension)),
        EmbeddingBackend::Bert => Arc::new(
            BertEmbedder::new(&config.model_id)
                .with_context(|| format!("Failed to load embedding model {}", config.model_id))?,
        ),
    };
    Ok(embedder)
}

/// Index a structured document into the configured backend as a new generation
///
/// The memory backend keeps nothing between runs, so for it this only
/// validates the document and reports the chunk count.
pub async fn build_index(config: &Config, document: &StructuredDocument) -> AnyResult<usize> {
    let chunks = flatten(document);
    let embedder = embedder_from_config(&config.embedding)?;

    let count = match config.index.backend {
        IndexBackend::Memory => {
            let index = InMemoryIndex::from_chunks(embedder, &chunks).await?;
            index.len().await?
        }
        IndexBackend::Qdrant => {
            let index =
                QdrantIndex::connect(&config.index.qdrant_url, &config.index.collection, embedder)
                    .await?;
            index.reset().await?;
            index.upsert(&chunks).await?
        }
    };

    info!(chunks = count, backend = ?config.index.backend, "index generation built");
    Ok(count)
}

/// Open the configured index for querying; `None` when it is not ready
pub async fn open_index(config: &Config) -> Option<Arc<dyn VectorIndex>> {
    match try_open_index(config).await {
        Ok(index) => index,
        Err(e) => {
            warn!(error = %format!("{:#}", e), "index unavailable");
            None
        }
    }
}

async fn try_open_index(config: &Config) -> AnyResult<Option<Arc<dyn VectorIndex>>> {
    let embedder = embedder_from_config(&config.embedding)?;

    match config.index.backend {
        IndexBackend::Memory => {
            let path = &config.paths.structured_json;
            if !path.exists() {
                warn!(path = %path.display(), "structured document not found");
                return Ok(None);
            }
            let document = StructuredDocument::load_json(path)?;
            let index: Arc<dyn VectorIndex> =
                Arc::new(InMemoryIndex::from_chunks(embedder, &flatten(&document)).await?);
            Ok(Some(index))
        }
        IndexBackend::Qdrant => {
            let index =
                QdrantIndex::connect(&config.index.qdrant_url, &config.index.collection, embedder)
                    .await?;
            if !index.collection_exists().await? {
                warn!(collection = %index.collection(), "collection not found");
                return Ok(None);
            }
            let index: Arc<dyn VectorIndex> = Arc::new(index);
            Ok(Some(index))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::builder::StructuredDocumentBuilder;

    fn config_with_json(path: std::path::PathBuf) -> Config {
        let mut config = Config::default();
        config.paths.structured_json = path;
        config
    }

    #[tokio::test]
    async fn test_open_missing_json_is_unavailable() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = config_with_json(dir.path().join("missing.json"));
        assert!(open_index(&config).await.is_none());
    }

    #[tokio::test]
    async fn test_open_invalid_json_is_unavailable() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(open_index(&config_with_json(path)).await.is_none());
    }

    #[tokio::test]
    async fn test_open_memory_index_from_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        let document = StructuredDocumentBuilder::new().build(
            "pci.txt",
            "Requirement 3: Protect stored data\n3.1 Keep data to a minimum",
        );
        document.write_json(&path).unwrap();

        let config = config_with_json(path);
        let index = open_index(&config).await.unwrap();
        assert_eq!(index.len().await.unwrap(), 2);
        assert_eq!(build_index(&config, &document).await.unwrap(), 2);
    }
}
