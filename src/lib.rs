//! compliance-rag - Regulatory standard structuring and retrieval
//!
//! Turns the extracted text of a security standard into a numbered
//! requirement tree, flattens it into index chunks, and answers questions
//! through a fallback search cascade over a similarity index.
//!
//! # Architecture
//!
//! - **document**: normalization, section extraction, document building
//! - **index**: embedders and similarity index backends
//! - **rag**: query classification, retrieval cascade, result assembly
//! - **llm**: generative-language client
//! - **cli**: argument parsing and terminal progress

pub mod cli;
pub mod config;
pub mod document;
pub mod errors;
pub mod index;
pub mod llm;
pub mod rag;

// Re-export commonly used types
pub use config::Config;
pub use document::{flatten, StructuredDocument, StructuredDocumentBuilder};
pub use errors::{RagError, Result};
pub use rag::{QueryClassifier, RagPipeline, ResultAssembler, RetrievalOrchestrator};
