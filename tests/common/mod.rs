//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Mutex;

use compliance_rag::document::{ChunkMetadata, IndexChunk};
use compliance_rag::errors::{RagError, Result};
use compliance_rag::index::{IndexHit, SearchFilter, VectorIndex};

/// One recorded similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSearch {
    pub query: String,
    pub k: usize,
    pub filter: Option<SearchFilter>,
}

/// Index double returning scripted hits per filter and recording calls
#[derive(Default)]
pub struct MockIndex {
    scripted: Vec<(Option<SearchFilter>, Vec<IndexHit>)>,
    calls: Mutex<Vec<RecordedSearch>>,
    fail_with: Option<String>,
}

impl MockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hits returned when the search uses exactly this filter
    pub fn on_filter(mut self, filter: SearchFilter, hits: Vec<IndexHit>) -> Self {
        self.scripted.push((Some(filter), hits));
        self
    }

    /// Hits returned for unfiltered searches
    pub fn on_unfiltered(mut self, hits: Vec<IndexHit>) -> Self {
        self.scripted.push((None, hits));
        self
    }

    /// Every search fails with an upstream error
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<RecordedSearch> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl VectorIndex for MockIndex {
    async fn reset(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, chunks: &[IndexChunk]) -> Result<usize> {
        Ok(chunks.len())
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<IndexHit>> {
        let filter = filter.filter(|f| !f.is_empty()).cloned();
        self.calls.lock().unwrap().push(RecordedSearch {
            query: query.to_string(),
            k,
            filter: filter.clone(),
        });

        if let Some(message) = &self.fail_with {
            return Err(RagError::Upstream(message.clone()));
        }

        Ok(self
            .scripted
            .iter()
            .find(|(scripted, _)| *scripted == filter)
            .map(|(_, hits)| hits.iter().take(k).cloned().collect())
            .unwrap_or_default())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.scripted.iter().map(|(_, hits)| hits.len()).sum())
    }
}

/// A hit with minimal metadata
pub fn hit(chunk_type: &str, number: &str, text: &str) -> IndexHit {
    IndexHit {
        text: text.to_string(),
        metadata: ChunkMetadata {
            chunk_type: chunk_type.to_string(),
            number: number.to_string(),
            title: String::new(),
            version: "4.0".to_string(),
            parent_requirement: number.split_once('.').map(|(p, _)| p.to_string()),
            page: None,
            section: None,
        },
        score: 1.0,
    }
}

pub const SAMPLE_STANDARD: &str = "Payment Card Industry (PCI) Data Security Standard
PCI DSS v4.0

Requirement 3: Protect stored account data
3.1 Processes and mechanisms for protecting stored account data are defined and understood.
All security policies are documented, kept up to date, in use, and known to all affected parties.
3.2 Storage of account data is kept to a minimum.
Coverage for all locations of stored account data.
3.3 Sensitive authentication data is not stored after authorization.

Requirement 8: Identify users and authenticate access to system components
8.2 User identification and related accounts are managed throughout an account's lifecycle.
8.3 Strong authentication for users and administrators is established and managed.
• Something you know, such as a password or passphrase.
• Something you have, such as a token device or smart card.
";
