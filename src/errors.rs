//! Error types for compliance-rag
//!
//! One enum covers the structuring pipeline, the retrieval cascade and the
//! adapters to external services. An empty extraction or an empty cascade
//! is not an error and never shows up here.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for structuring and retrieval
#[derive(Error, Debug)]
pub enum RagError {
    /// Source document missing at the expected location
    #[error("Source document not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The similarity index could not be loaded or reached
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// Embedding, index or generation service failed
    #[error("Upstream service failure: {0}")]
    Upstream(String),

    /// An external call exceeded its deadline
    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// Caller supplied something unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl RagError {
    /// True for conditions that mean "system not ready" rather than
    /// "nothing relevant found". An expired deadline counts as not ready.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RagError::IndexUnavailable(_) | RagError::Timeout { .. })
    }
}

/// Result type alias for structuring and retrieval operations
pub type Result<T> = std::result::Result<T, RagError>;

/// Adapter errors collapse into upstream failures at the trait boundary
impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Upstream(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = RagError::NotFound {
            path: PathBuf::from("input/standard.txt"),
        };
        assert!(err.to_string().contains("input/standard.txt"));
    }

    #[test]
    fn test_timeout_display() {
        let err = RagError::Timeout {
            operation: "similarity search".to_string(),
            duration_ms: 1500,
        };
        assert!(err.to_string().contains("similarity search"));
        assert!(err.to_string().contains("1500"));
    }

    #[test]
    fn test_unavailable_is_distinct_from_upstream() {
        assert!(RagError::IndexUnavailable("no collection".into()).is_unavailable());
        assert!(!RagError::Upstream("embedding failed".into()).is_unavailable());
    }

    #[test]
    fn test_timeout_is_unavailable() {
        let err = RagError::Timeout {
            operation: "generation".to_string(),
            duration_ms: 20,
        };
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_anyhow_conversion_keeps_context() {
        let err: RagError = anyhow::anyhow!("connection refused")
            .context("Failed to search points")
            .into();
        let text = err.to_string();
        assert!(text.contains("Failed to search points"));
        assert!(text.contains("connection refused"));
    }
}
