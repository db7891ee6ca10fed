//! Structured document assembly and flattening into index chunks

use chrono::Utc;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;

use crate::document::extractor::{ExtractionReport, SectionExtractor};
use crate::document::normalizer::TextNormalizer;
use crate::document::observer::{NoopObserver, ProgressObserver};
use crate::document::source::{join_pages, PageSource};
use crate::document::types::{
    ChunkMetadata, DocumentMetadata, IndexChunk, StructuredDocument, REQUIREMENT_TYPE,
    SUBREQUIREMENT_TYPE, UNKNOWN_VERSION,
};
use crate::errors::{RagError, Result};

/// Default standard name used for version detection and document type
pub const DEFAULT_STANDARD: &str = "PCI DSS";

/// Runs normalization, extraction and version detection
pub struct StructuredDocumentBuilder {
    standard: String,
    normalizer: TextNormalizer,
    extractor: SectionExtractor,
    version_pattern: Regex,
    observer: Arc<dyn ProgressObserver>,
}

impl StructuredDocumentBuilder {
    /// Create a builder for the default standard
    pub fn new() -> Self {
        Self::for_standard(DEFAULT_STANDARD)
    }

    /// Create a builder for a named standard ("PCI DSS", "ISO 27001", ...)
    pub fn for_standard(standard: &str) -> Self {
        Self {
            standard: standard.to_string(),
            normalizer: TextNormalizer::new(),
            extractor: SectionExtractor::new(),
            version_pattern: version_regex(standard),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Attach a progress observer
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn standard(&self) -> &str {
        &self.standard
    }

    /// Build a structured document from raw extracted text
    pub fn build(&self, document_name: &str, raw_text: &str) -> StructuredDocument {
        self.build_with_report(document_name, raw_text).0
    }

    /// Build and also return the extraction report
    pub fn build_with_report(
        &self,
        document_name: &str,
        raw_text: &str,
    ) -> (StructuredDocument, ExtractionReport) {
        let normalized = self.normalizer.normalize(raw_text);
        let report = self.extractor.extract_with_report(&normalized);

        for requirement in &report.requirements {
            self.observer
                .on_requirement(&requirement.number, &requirement.title);
        }
        for violation in &report.violations {
            self.observer.on_violation(violation);
        }

        let document = StructuredDocument {
            document_name: document_name.to_string(),
            metadata: DocumentMetadata {
                doc_type: format!("{} Standard", self.standard),
                version: self.detect_version(&normalized),
                processed_date: Utc::now(),
            },
            requirements: report.requirements.clone(),
        };

        self.observer
            .on_finished(document.requirements.len(), document.chunk_count());

        (document, report)
    }

    /// Read a source through a page extractor and build it
    pub fn build_from_source(
        &self,
        source: &dyn PageSource,
        path: &Path,
    ) -> Result<StructuredDocument> {
        let pages = source.extract_pages(path)?;
        let total = pages.len();
        self.observer.on_pages(total);
        for done in 1..=total {
            self.observer.on_page(done, total);
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| RagError::InvalidInput(format!("not a file: {}", path.display())))?;

        Ok(self.build(&name, &join_pages(&pages)))
    }

    /// First `<standard> v<digits>.<digits>[.<digits>]` in the text
    pub fn detect_version(&self, text: &str) -> String {
        self.version_pattern
            .captures(text)
            .map(|caps| caps[1].to_string())
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string())
    }
}

impl Default for StructuredDocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn version_regex(standard: &str) -> Regex {
    let name = standard
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    Regex::new(&format!(r"{}\s+v(\d+\.\d+(?:\.\d+)?)", name)).expect("escaped version pattern")
}

/// Flatten a document into index chunks.
///
/// Each requirement is followed by its sub-requirements, in document order.
pub fn flatten(document: &StructuredDocument) -> Vec<IndexChunk> {
    let version = document.version();
    let mut chunks = Vec::with_capacity(document.chunk_count());

    for requirement in &document.requirements {
        chunks.push(IndexChunk {
            text: chunk_text(&requirement.number, &requirement.title, &requirement.content),
            metadata: ChunkMetadata {
                chunk_type: REQUIREMENT_TYPE.to_string(),
                number: requirement.number.clone(),
                title: requirement.title.clone(),
                version: version.to_string(),
                parent_requirement: None,
                page: None,
                section: None,
            },
        });

        for sub in &requirement.subrequirements {
            chunks.push(IndexChunk {
                text: chunk_text(&sub.number, &sub.title, &sub.content),
                metadata: ChunkMetadata {
                    chunk_type: SUBREQUIREMENT_TYPE.to_string(),
                    number: sub.number.clone(),
                    title: sub.title.clone(),
                    version: version.to_string(),
                    parent_requirement: Some(requirement.number.clone()),
                    page: None,
                    section: None,
                },
            });
        }
    }

    chunks
}

fn chunk_text(number: &str, title: &str, content: &str) -> String {
    if content.is_empty() {
        format!("{}: {}", number, title)
    } else {
        format!("{}: {}\n\n{}", number, title, content)
    }
}
