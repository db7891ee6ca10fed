// Result assembly: deduplicated, cited context or a canned fallback
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::index::IndexHit;
use crate::rag::query::QueryContext;
use crate::rag::topics::FallbackTable;

/// Width of the rule between context entries
const SEPARATOR_WIDTH: usize = 50;

/// How a context entry is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Requirement,
    TestingProcedure,
    ImplementationGuidance,
    ApplicabilityNote,
}

impl EntryKind {
    /// Classify by substring of the chunk type
    pub fn from_chunk_type(chunk_type: &str) -> Self {
        let lowered = chunk_type.to_lowercase();
        if lowered.contains("test") {
            EntryKind::TestingProcedure
        } else if lowered.contains("guide") {
            EntryKind::ImplementationGuidance
        } else if lowered.contains("note") {
            EntryKind::ApplicabilityNote
        } else {
            EntryKind::Requirement
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::Requirement => "Requirement",
            EntryKind::TestingProcedure => "Testing Procedure",
            EntryKind::ImplementationGuidance => "Implementation Guidance",
            EntryKind::ApplicabilityNote => "Applicability Note",
        }
    }
}

/// Formatted context block for prompt augmentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledContext {
    /// Entries joined by the separator rule
    pub text: String,
    /// Number of entries after deduplication
    pub entry_count: usize,
    /// Numbers of the cited chunks, in output order
    pub numbers: Vec<String>,
}

/// Outcome of assembling retrieved hits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assembled {
    Context(AssembledContext),
    /// Canned text used when nothing survived; `topic` is `None` for the
    /// generic fallback
    Fallback { topic: Option<String>, text: String },
}

impl Assembled {
    pub fn text(&self) -> &str {
        match self {
            Assembled::Context(ctx) => &ctx.text,
            Assembled::Fallback { text, .. } => text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Assembled::Fallback { .. })
    }
}

/// Assembles retrieved hits into a cited context block
pub struct ResultAssembler {
    standard: String,
    fallbacks: Arc<FallbackTable>,
}

impl ResultAssembler {
    pub fn new(standard: impl Into<String>, fallbacks: Arc<FallbackTable>) -> Self {
        Self {
            standard: standard.into(),
            fallbacks,
        }
    }

    /// Deduplicate and format hits; degrade to fallback text when empty
    pub fn assemble(&self, hits: &[IndexHit], query: &QueryContext) -> Assembled {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut numbers = Vec::new();

        for hit in hits {
            let content = hit.text.trim();
            if !seen.insert(content) {
                debug!(number = %hit.metadata.number, "dropping duplicate hit");
                continue;
            }
            entries.push(self.format_entry(hit, content));
            numbers.push(hit.metadata.number.clone());
        }

        if entries.is_empty() {
            return self.fallback(query);
        }

        let separator = format!("\n\n{}\n\n", "=".repeat(SEPARATOR_WIDTH));
        Assembled::Context(AssembledContext {
            text: entries.join(&separator),
            entry_count: entries.len(),
            numbers,
        })
    }

    /// Topical fallback for the first matching topic, else the generic text
    pub fn fallback(&self, query: &QueryContext) -> Assembled {
        match self.fallbacks.for_topics(&query.topics) {
            Some((topic, text)) => {
                info!(topic, "no results, using topic fallback");
                Assembled::Fallback {
                    topic: Some(topic.to_string()),
                    text: text.to_string(),
                }
            }
            None => {
                info!("no results, using generic fallback");
                Assembled::Fallback {
                    topic: None,
                    text: self.fallbacks.generic().to_string(),
                }
            }
        }
    }

    fn format_entry(&self, hit: &IndexHit, content: &str) -> String {
        let metadata = &hit.metadata;
        let mut citation = format!(
            "[{} {}] ({} v{}",
            metadata.chunk_type, metadata.number, self.standard, metadata.version
        );
        if let Some(page) = metadata.page {
            citation.push_str(&format!(", Page {}", page));
        }
        citation.push(')');

        let mut lines = vec![
            citation,
            format!("{}:", EntryKind::from_chunk_type(&metadata.chunk_type).label()),
        ];
        if let Some(section) = metadata.section.as_deref().filter(|s| !s.is_empty()) {
            lines.push(format!("Section: {}", section));
        }
        lines.push(content.to_string());
        lines.join("\n")
    }
}
