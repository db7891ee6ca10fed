//! Qdrant-backed similarity index
#![allow(deprecated)]

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use qdrant_client::{
    client::QdrantClient,
    qdrant::{
        r#match::MatchValue, vectors_config::Config, with_payload_selector::SelectorOptions,
        Condition, CreateCollection, Distance, FieldCondition, Filter, Match, PointStruct,
        SearchPoints, Value as QdrantValue, VectorParams, VectorsConfig, WithPayloadSelector,
    },
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::document::types::{ChunkMetadata, IndexChunk};
use crate::errors::{RagError, Result};
use crate::index::embedding::{embed_query, Embedder};
use crate::index::{IndexHit, SearchFilter, VectorIndex};

/// Payload key holding the chunk text
const DOCUMENT_KEY: &str = "document";

/// Qdrant collection holding one index generation
pub struct QdrantIndex {
    client: QdrantClient,
    collection: String,
    embedder: Arc<dyn Embedder>,
}

impl QdrantIndex {
    /// Connect to a Qdrant server; fails if the server cannot be reached
    pub async fn connect(url: &str, collection: &str, embedder: Arc<dyn Embedder>) -> AnyResult<Self> {
        let client = QdrantClient::from_url(url)
            .build()
            .context("Failed to create Qdrant client")?;

        client
            .list_collections()
            .await
            .with_context(|| format!("Failed to reach Qdrant at {}", url))?;

        Ok(Self {
            client,
            collection: collection.to_string(),
            embedder,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Whether the collection exists on the server
    pub async fn collection_exists(&self) -> AnyResult<bool> {
        let collections = self.client.list_collections().await?;
        Ok(collections
            .collections
            .iter()
            .any(|c| c.name == self.collection))
    }

    async fn create_collection(&self) -> AnyResult<()> {
        self.client
            .create_collection(&CreateCollection {
                collection_name: self.collection.clone(),
                vectors_config: Some(VectorsConfig {
                    config: Some(Config::Params(VectorParams {
                        size: self.embedder.dimension() as u64,
                        distance: Distance::Cosine.into(),
                        ..Default::default()
                    })),
                }),
                ..Default::default()
            })
            .await
            .with_context(|| format!("Failed to create collection: {}", self.collection))?;
        Ok(())
    }

    async fn recreate(&self) -> AnyResult<()> {
        if self.collection_exists().await? {
            self.client
                .delete_collection(&self.collection)
                .await
                .with_context(|| format!("Failed to delete collection: {}", self.collection))?;
        }
        self.create_collection().await?;
        info!(collection = %self.collection, "started new index generation");
        Ok(())
    }

    async fn upsert_points(&self, chunks: &[IndexChunk]) -> AnyResult<usize> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .context("Failed to embed chunks")?;

        let points: Vec<PointStruct> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                PointStruct::new(
                    uuid::Uuid::new_v4().to_string(),
                    embedding,
                    metadata_to_payload(&chunk.text, &chunk.metadata),
                )
            })
            .collect();
        let count = points.len();

        self.client
            .upsert_points_blocking(&self.collection, None, points, None)
            .await
            .context("Failed to batch upsert points")?;

        Ok(count)
    }

    async fn search_points(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> AnyResult<Vec<IndexHit>> {
        let vector = embed_query(&self.embedder, query)
            .await
            .context("Failed to generate query embedding")?;

        let search_result = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.collection.clone(),
                vector,
                limit: k as u64,
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                filter: filter.filter(|f| !f.is_empty()).map(to_qdrant_filter),
                ..Default::default()
            })
            .await
            .context("Failed to search points")?;

        Ok(search_result
            .result
            .into_iter()
            .map(|point| {
                let (text, metadata) = payload_to_metadata(&point.payload);
                IndexHit {
                    text,
                    metadata,
                    score: point.score,
                }
            })
            .collect())
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn reset(&self) -> Result<()> {
        Ok(self.recreate().await?)
    }

    async fn upsert(&self, chunks: &[IndexChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        if !self.collection_exists().await? {
            self.create_collection().await?;
        }
        Ok(self.upsert_points(chunks).await?)
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<IndexHit>> {
        debug!(collection = %self.collection, ?filter, k, "qdrant search");
        Ok(self.search_points(query, k, filter).await?)
    }

    async fn len(&self) -> Result<usize> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| RagError::IndexUnavailable(e.to_string()))?;
        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0) as usize)
    }
}

fn to_qdrant_filter(filter: &SearchFilter) -> Filter {
    let must = filter
        .iter()
        .map(|(key, value)| {
            let match_value = match (key, value.parse::<i64>()) {
                ("page", Ok(page)) => MatchValue::Integer(page),
                _ => MatchValue::Keyword(value.to_string()),
            };
            Condition {
                condition_one_of: Some(
                    qdrant_client::qdrant::condition::ConditionOneOf::Field(FieldCondition {
                        key: key.to_string(),
                        r#match: Some(Match {
                            match_value: Some(match_value),
                        }),
                        ..Default::default()
                    }),
                ),
            }
        })
        .collect();

    Filter {
        must,
        ..Default::default()
    }
}

fn metadata_to_payload(text: &str, metadata: &ChunkMetadata) -> HashMap<String, QdrantValue> {
    let mut payload = HashMap::new();
    payload.insert(DOCUMENT_KEY.to_string(), QdrantValue::from(text.to_string()));
    payload.insert("type".to_string(), QdrantValue::from(metadata.chunk_type.clone()));
    payload.insert("number".to_string(), QdrantValue::from(metadata.number.clone()));
    payload.insert("title".to_string(), QdrantValue::from(metadata.title.clone()));
    payload.insert("version".to_string(), QdrantValue::from(metadata.version.clone()));
    if let Some(parent) = &metadata.parent_requirement {
        payload.insert("parent_requirement".to_string(), QdrantValue::from(parent.clone()));
    }
    if let Some(page) = metadata.page {
        payload.insert("page".to_string(), QdrantValue::from(page as i64));
    }
    if let Some(section) = &metadata.section {
        payload.insert("section".to_string(), QdrantValue::from(section.clone()));
    }
    payload
}

fn payload_to_metadata(payload: &HashMap<String, QdrantValue>) -> (String, ChunkMetadata) {
    let text = payload_string(payload, DOCUMENT_KEY).unwrap_or_default();
    let metadata = ChunkMetadata {
        chunk_type: payload_string(payload, "type").unwrap_or_default(),
        number: payload_string(payload, "number").unwrap_or_default(),
        title: payload_string(payload, "title").unwrap_or_default(),
        version: payload_string(payload, "version").unwrap_or_default(),
        parent_requirement: payload_string(payload, "parent_requirement"),
        page: payload_integer(payload, "page").and_then(|p| u32::try_from(p).ok()),
        section: payload_string(payload, "section"),
    };
    (text, metadata)
}

fn payload_string(payload: &HashMap<String, QdrantValue>, key: &str) -> Option<String> {
    use qdrant_client::qdrant::value::Kind;
    match payload.get(key)?.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        Kind::IntegerValue(i) => Some(i.to_string()),
        _ => None,
    }
}

fn payload_integer(payload: &HashMap<String, QdrantValue>, key: &str) -> Option<i64> {
    use qdrant_client::qdrant::value::Kind;
    match payload.get(key)?.kind.as_ref()? {
        Kind::IntegerValue(i) => Some(*i),
        Kind::StringValue(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::types::SUBREQUIREMENT_TYPE;
    use crate::index::embedding::HashingEmbedder;

    fn metadata() -> ChunkMetadata {
        ChunkMetadata {
            chunk_type: SUBREQUIREMENT_TYPE.to_string(),
            number: "3.1".to_string(),
            title: "Keep data to a minimum".to_string(),
            version: "3.2.1".to_string(),
            parent_requirement: Some("3".to_string()),
            page: Some(14),
            section: None,
        }
    }

    #[test]
    fn test_payload_roundtrip() {
        let payload = metadata_to_payload("3.1: Keep data", &metadata());
        let (text, restored) = payload_to_metadata(&payload);
        assert_eq!(text, "3.1: Keep data");
        assert_eq!(restored, metadata());
    }

    #[test]
    fn test_filter_conditions() {
        let filter = SearchFilter::new().with("number", "3").with("page", "14");
        let qdrant_filter = to_qdrant_filter(&filter);
        assert_eq!(qdrant_filter.must.len(), 2);
    }

    #[tokio::test]
    #[ignore] // Integration test - requires Qdrant
    async fn test_upsert_and_filtered_search() {
        let index = QdrantIndex::connect(
            "http://localhost:6334",
            "compliance_rag_test",
            Arc::new(HashingEmbedder::default()),
        )
        .await
        .unwrap();
        assert_eq!(index.collection(), "compliance_rag_test");
        index.reset().await.unwrap();
        assert!(index.collection_exists().await.unwrap());

        let chunk = IndexChunk {
            text: "3.1: Keep data to a minimum".to_string(),
            metadata: metadata(),
        };
        assert_eq!(index.upsert(&[chunk]).await.unwrap(), 1);

        let filter = SearchFilter::new().with("number", "3.1");
        let hits = index.similarity_search("data", 4, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.parent_requirement.as_deref(), Some("3"));
    }
}
