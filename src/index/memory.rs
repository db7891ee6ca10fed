//! In-process similarity index

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::types::{ChunkMetadata, IndexChunk};
use crate::errors::{RagError, Result};
use crate::index::embedding::{cosine_similarity, embed_query, Embedder};
use crate::index::{IndexHit, SearchFilter, VectorIndex};

struct StoredChunk {
    text: String,
    metadata: ChunkMetadata,
    embedding: Vec<f32>,
}

/// Brute-force cosine index held in memory
pub struct InMemoryIndex {
    embedder: Arc<dyn Embedder>,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            chunks: RwLock::new(Vec::new()),
        }
    }

    /// Create an index and load chunks into it
    pub async fn from_chunks(embedder: Arc<dyn Embedder>, chunks: &[IndexChunk]) -> Result<Self> {
        let index = Self::new(embedder);
        index.upsert(chunks).await?;
        Ok(index)
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn reset(&self) -> Result<()> {
        self.chunks.write().await.clear();
        Ok(())
    }

    async fn upsert(&self, chunks: &[IndexChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;
        if embeddings.len() != chunks.len() {
            return Err(RagError::Upstream(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let mut stored = self.chunks.write().await;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            stored.push(StoredChunk {
                text: chunk.text.clone(),
                metadata: chunk.metadata.clone(),
                embedding,
            });
        }

        debug!(added = chunks.len(), total = stored.len(), "chunks indexed in memory");
        Ok(chunks.len())
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<IndexHit>> {
        let query_embedding = embed_query(&self.embedder, query).await?;
        let stored = self.chunks.read().await;

        let mut scored: Vec<(f32, &StoredChunk)> = stored
            .iter()
            .filter(|c| filter.map_or(true, |f| f.matches(&c.metadata)))
            .map(|c| (cosine_similarity(&query_embedding, &c.embedding), c))
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, c)| IndexHit {
                text: c.text.clone(),
                metadata: c.metadata.clone(),
                score,
            })
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.chunks.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::builder::{flatten, StructuredDocumentBuilder};
    use crate::index::embedding::HashingEmbedder;

    const TEXT: &str = "PCI DSS v3.2.1
Requirement 3: Protect stored cardholder data
3.1 Keep cardholder data storage to a minimum
3.4 Render PAN unreadable anywhere it is stored using strong cryptography
Requirement 8: Identify and authenticate access
8.1 Assign all users a unique ID before allowing access";

    async fn index() -> InMemoryIndex {
        let document = StructuredDocumentBuilder::new().build("std.txt", TEXT);
        InMemoryIndex::from_chunks(Arc::new(HashingEmbedder::default()), &flatten(&document))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_len_and_reset() {
        let index = index().await;
        assert_eq!(index.len().await.unwrap(), 5);
        index.reset().await.unwrap();
        assert_eq!(index.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_filtered_search_exact_match() {
        let index = index().await;
        let filter = SearchFilter::new().with("number", "3.4");

        let hits = index.similarity_search("anything", 4, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.number, "3.4");
    }

    #[tokio::test]
    async fn test_filter_by_parent() {
        let index = index().await;
        let filter = SearchFilter::new().with("parent_requirement", "3");

        let hits = index.similarity_search("data", 10, Some(&filter)).await.unwrap();
        let numbers: Vec<_> = hits.iter().map(|h| h.metadata.number.as_str()).collect();
        assert_eq!(hits.len(), 2);
        assert!(numbers.contains(&"3.1") && numbers.contains(&"3.4"));
    }

    #[tokio::test]
    async fn test_unfiltered_ranking() {
        let index = index().await;
        let hits = index
            .similarity_search("unique ID for all users", 2, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata.number, "8.1");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let index = index().await;
        // A query without tokens scores zero against every chunk
        let hits = index.similarity_search("", 5, None).await.unwrap();
        let numbers: Vec<_> = hits.iter().map(|h| h.metadata.number.as_str()).collect();
        assert_eq!(numbers, vec!["3", "3.1", "3.4", "8", "8.1"]);
    }

    #[tokio::test]
    async fn test_no_match_is_empty() {
        let index = index().await;
        let filter = SearchFilter::new().with("number", "12.9");
        assert!(index.similarity_search("q", 4, Some(&filter)).await.unwrap().is_empty());
    }

    /// Hashing embedder that blocks the calling thread on single-text calls
    struct SlowQueryEmbedder(HashingEmbedder);

    impl Embedder for SlowQueryEmbedder {
        fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
            if texts.len() == 1 {
                std::thread::sleep(std::time::Duration::from_millis(300));
            }
            self.0.embed_batch(texts)
        }

        fn dimension(&self) -> usize {
            self.0.dimension()
        }
    }

    #[tokio::test]
    async fn test_slow_query_embedding_respects_timeout() {
        let document = StructuredDocumentBuilder::new().build("std.txt", TEXT);
        let index = InMemoryIndex::from_chunks(
            Arc::new(SlowQueryEmbedder(HashingEmbedder::default())),
            &flatten(&document),
        )
        .await
        .unwrap();

        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            index.similarity_search("stored data", 4, None),
        )
        .await;

        assert!(outcome.is_err());
        assert!(started.elapsed() < std::time::Duration::from_millis(250));
    }
}
