//! Retrieval side: query classification, the search cascade, result
//! assembly and the generation-backed answer and advisory flows.

pub mod context;
pub mod pipeline;
pub mod query;
pub mod retrieval;
pub mod tasks;
pub mod topics;

pub use context::{Assembled, AssembledContext, EntryKind, ResultAssembler};
pub use pipeline::{RagOutcome, RagPipeline};
pub use query::{QueryClassifier, QueryContext, RefKind, RequirementRef};
pub use retrieval::{RetrievalOrchestrator, RetrievalResult, SearchStrategy};
pub use tasks::{AdvisoryService, AdvisoryTask};
pub use topics::{FallbackTable, Topic, TopicConfig, TopicTable};
