//! Similarity index boundary
//!
//! The retrieval cascade only talks to [`VectorIndex`]. Two backends are
//! provided: an in-process index for single-document deployments and tests,
//! and a Qdrant-backed index.

pub mod embedding;
pub mod factory;
pub mod memory;
pub mod qdrant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::document::types::{ChunkMetadata, IndexChunk};
use crate::errors::Result;

pub use embedding::{BertEmbedder, Embedder, HashingEmbedder};
pub use factory::{build_index, embedder_from_config, open_index};
pub use memory::InMemoryIndex;
pub use qdrant::QdrantIndex;

/// Exact-match metadata filter; every field must equal its value
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchFilter {
    fields: BTreeMap<String, String>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether chunk metadata satisfies every condition
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        self.iter()
            .all(|(field, value)| metadata.field(field).as_deref() == Some(value))
    }
}

/// A search result: chunk text with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHit {
    pub text: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}

/// Similarity index over document chunks
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Drop existing content and start a new index generation
    async fn reset(&self) -> Result<()>;

    /// Add chunks; returns how many were stored
    async fn upsert(&self, chunks: &[IndexChunk]) -> Result<usize>;

    /// Best matches first; ties keep insertion order. An absent or empty
    /// filter means unfiltered ranking.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<IndexHit>>;

    /// Number of stored chunks
    async fn len(&self) -> Result<usize>;
}
