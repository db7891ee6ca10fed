// Document structuring pipeline
//
// Turns extracted standard text into a requirement tree and index chunks.
//
// Components:
// - Normalizer: whitespace and bullet cleanup
// - Extractor: line state machine producing requirements / sub-requirements
// - Builder: version detection, document metadata, flattening to chunks
// - Source: page extraction boundary

pub mod builder;
pub mod extractor;
pub mod normalizer;
pub mod observer;
pub mod source;
pub mod types;

pub use builder::{flatten, StructuredDocumentBuilder};
pub use extractor::{ExtractionReport, NumberingViolation, SectionExtractor, ViolationKind};
pub use normalizer::TextNormalizer;
pub use observer::{NoopObserver, ProgressObserver, TracingObserver};
pub use source::{PageSource, PlainTextSource};
pub use types::{
    ChunkMetadata, IndexChunk, Requirement, StructuredDocument, Subrequirement,
};
