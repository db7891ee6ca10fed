// Retrieval cascade over the similarity index
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::{RagError, Result};
use crate::index::{IndexHit, SearchFilter, VectorIndex};
use crate::rag::query::{QueryContext, RequirementRef};

/// Default number of results per search
pub const DEFAULT_K: usize = 4;

/// Default deadline for one index call
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Which cascade step produced the hits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Filtered on the referenced number and kind
    ExactReference,
    /// Filtered on the containing requirement's number
    ParentReference,
    /// Unfiltered search with a requirement-framed query
    ReferenceExpansion,
    /// Unfiltered search with the topic-enhanced query
    TopicSemantic,
}

impl std::fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SearchStrategy::ExactReference => "exact reference",
            SearchStrategy::ParentReference => "parent reference",
            SearchStrategy::ReferenceExpansion => "reference expansion",
            SearchStrategy::TopicSemantic => "topic semantic",
        };
        f.write_str(name)
    }
}

/// Hits from the last cascade step that was run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<IndexHit>,
    pub strategy: SearchStrategy,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Ordered fallback cascade of index searches
pub struct RetrievalOrchestrator {
    index: Option<Arc<dyn VectorIndex>>,
    standard: String,
    k: usize,
    timeout: Duration,
}

impl RetrievalOrchestrator {
    /// Create an orchestrator; `None` means no index is loaded
    pub fn new(index: Option<Arc<dyn VectorIndex>>, standard: impl Into<String>) -> Self {
        Self {
            index,
            standard: standard.into(),
            k: DEFAULT_K,
            timeout: DEFAULT_SEARCH_TIMEOUT,
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn is_available(&self) -> bool {
        self.index.is_some()
    }

    /// Run the cascade with the configured `k`
    pub async fn retrieve(&self, ctx: &QueryContext) -> Result<RetrievalResult> {
        self.retrieve_top_k(ctx, self.k).await
    }

    /// Run the cascade, stopping at the first step with hits
    ///
    /// Returns `IndexUnavailable` without searching when no index is loaded.
    pub async fn retrieve_top_k(&self, ctx: &QueryContext, k: usize) -> Result<RetrievalResult> {
        let index = self.index()?;

        let Some(reference) = &ctx.requirement_ref else {
            info!("semantic search with topic enhancement");
            let hits = self
                .search_with(index, &ctx.enhanced_query, k, None)
                .await?;
            return Ok(RetrievalResult {
                hits,
                strategy: SearchStrategy::TopicSemantic,
            });
        };

        info!(number = %reference.number, kind = %reference.kind, "direct lookup");
        let exact = SearchFilter::new()
            .with("number", reference.number.as_str())
            .with("type", reference.filter_type());
        let hits = self
            .search_with(index, &ctx.raw_query, k, Some(&exact))
            .await?;
        if !hits.is_empty() {
            return Ok(RetrievalResult {
                hits,
                strategy: SearchStrategy::ExactReference,
            });
        }

        if let Some(parent) = reference.parent_number() {
            info!(parent, "checking parent requirement");
            let filter = SearchFilter::new().with("number", parent);
            let hits = self
                .search_with(index, &ctx.raw_query, k, Some(&filter))
                .await?;
            if !hits.is_empty() {
                return Ok(RetrievalResult {
                    hits,
                    strategy: SearchStrategy::ParentReference,
                });
            }
        }

        info!("checking related sections");
        let expanded = self.expansion_query(reference, &ctx.raw_query);
        let hits = self.search_with(index, &expanded, k, None).await?;
        Ok(RetrievalResult {
            hits,
            strategy: SearchStrategy::ReferenceExpansion,
        })
    }

    /// One unfiltered search, subject to the same availability and deadline
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<IndexHit>> {
        let index = self.index()?;
        self.search_with(index, query, k, None).await
    }

    /// Requirement-framed query used when filtered lookups find nothing
    pub fn expansion_query(&self, reference: &RequirementRef, raw_query: &str) -> String {
        format!(
            "{} requirement {}\nInclude:\n- Main requirement text\n- Testing procedures\n- Implementation guidance\n- Applicability notes\nQuery: {}",
            self.standard, reference.number, raw_query
        )
    }

    fn index(&self) -> Result<&Arc<dyn VectorIndex>> {
        self.index.as_ref().ok_or_else(|| {
            warn!("retrieval requested without a loaded index");
            RagError::IndexUnavailable("no index has been loaded".to_string())
        })
    }

    async fn search_with(
        &self,
        index: &Arc<dyn VectorIndex>,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<IndexHit>> {
        let hits = with_deadline(
            self.timeout,
            index.similarity_search(query, k, filter),
        )
        .await?;
        debug!(?filter, hits = hits.len(), "search step finished");
        Ok(hits)
    }
}

/// Expired index calls count as an unavailable index
async fn with_deadline<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "index search timed out");
            Err(RagError::IndexUnavailable(format!(
                "index search timed out after {}ms",
                timeout.as_millis()
            )))
        }
    }
}
