// Retrieval cascade module
pub mod engine;

pub use engine::{RetrievalOrchestrator, RetrievalResult, SearchStrategy, DEFAULT_K};
