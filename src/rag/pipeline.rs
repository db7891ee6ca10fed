// End-to-end answering: classify, retrieve, assemble, generate
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::errors::{RagError, Result};
use crate::index::VectorIndex;
use crate::llm::Generator;
use crate::rag::context::{Assembled, AssembledContext, ResultAssembler};
use crate::rag::query::{QueryClassifier, QueryContext};
use crate::rag::retrieval::{RetrievalOrchestrator, SearchStrategy};
use crate::rag::topics::TopicTable;

/// Returned when no index is loaded or the index stops answering
pub const INDEX_UNAVAILABLE_MESSAGE: &str =
    "The requirement index is not initialised. Run `compliance-rag index` first.";

/// Returned when the generation service does not answer within its deadline
pub const MODEL_UNAVAILABLE_MESSAGE: &str =
    "The language model is not responding. Check that Ollama is running and try again.";

/// Returned when generation produced no text
pub const REPHRASE_MESSAGE: &str =
    "I need to think about this differently. Could you rephrase your question?";

/// Returned when an upstream service failed
pub const APOLOGY_MESSAGE: &str =
    "I encountered an error processing your query. Please try again or rephrase your question.";

/// Default deadline for one generation call
const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Everything retrieval produced for one query, before generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagOutcome {
    pub query: QueryContext,
    pub strategy: SearchStrategy,
    /// Hits returned by the cascade step that ran last
    pub hits_retrieved: usize,
    pub assembled: Assembled,
}

/// Question answering over the structured standard
pub struct RagPipeline {
    topics: Arc<TopicTable>,
    orchestrator: Arc<RetrievalOrchestrator>,
    assembler: ResultAssembler,
    generator: Arc<dyn Generator>,
    standard: String,
    generation_timeout: Duration,
}

impl RagPipeline {
    pub fn new(
        topics: Arc<TopicTable>,
        orchestrator: Arc<RetrievalOrchestrator>,
        assembler: ResultAssembler,
        generator: Arc<dyn Generator>,
        standard: impl Into<String>,
    ) -> Self {
        Self {
            topics,
            orchestrator,
            assembler,
            generator,
            standard: standard.into(),
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    /// Wire a pipeline from configuration
    pub fn from_config(
        config: &Config,
        index: Option<Arc<dyn VectorIndex>>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let orchestrator = RetrievalOrchestrator::new(index, config.standard.name.as_str())
            .with_k(config.retrieval.k)
            .with_timeout(config.search_timeout());
        let assembler =
            ResultAssembler::new(config.standard.name.as_str(), Arc::new(config.fallback_table()));

        Self::new(
            Arc::new(config.topic_table()),
            Arc::new(orchestrator),
            assembler,
            generator,
            config.standard.name.as_str(),
        )
        .with_generation_timeout(config.generation_timeout())
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn orchestrator(&self) -> &Arc<RetrievalOrchestrator> {
        &self.orchestrator
    }

    pub fn classify(&self, query: &str) -> QueryContext {
        QueryClassifier::classify(query, &self.topics)
    }

    /// Retrieval and assembly without generation
    pub async fn context(&self, query: &str) -> Result<RagOutcome> {
        let ctx = self.classify(query);
        let result = self.orchestrator.retrieve(&ctx).await?;
        info!(
            strategy = %result.strategy,
            hits = result.hits.len(),
            "retrieval finished"
        );

        let assembled = self.assembler.assemble(&result.hits, &ctx);
        Ok(RagOutcome {
            strategy: result.strategy,
            hits_retrieved: result.hits.len(),
            query: ctx,
            assembled,
        })
    }

    /// Answer a question; never fails, degrading to a safe message instead
    pub async fn answer(&self, query: &str) -> String {
        let outcome = match self.context(query).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_unavailable() => {
                warn!(error = %e, "index unavailable");
                return INDEX_UNAVAILABLE_MESSAGE.to_string();
            }
            Err(e) => {
                error!(error = %e, "retrieval failed");
                return APOLOGY_MESSAGE.to_string();
            }
        };

        let context = match outcome.assembled {
            Assembled::Fallback { text, .. } => return text,
            Assembled::Context(context) => context,
        };

        let prompt = self.build_prompt(query, &context);
        match self.generate(&prompt).await {
            Ok(text) if text.trim().is_empty() => REPHRASE_MESSAGE.to_string(),
            Ok(text) => text.trim().to_string(),
            Err(e) if e.is_unavailable() => {
                warn!(error = %e, "generation unavailable");
                MODEL_UNAVAILABLE_MESSAGE.to_string()
            }
            Err(e) => {
                error!(error = %e, "generation failed");
                APOLOGY_MESSAGE.to_string()
            }
        }
    }

    /// Citation-first answering prompt
    pub fn build_prompt(&self, query: &str, context: &AssembledContext) -> String {
        let standard = &self.standard;
        format!(
            r#"You are a precise security compliance assistant specializing in {standard} standards. Analyze the following information:

QUERY: "{query}"

RETRIEVED INFORMATION:
{context}

Response Guidelines:
1. Exact Citations
   - Quote requirements verbatim with version, page numbers and section references
   - Format citations as: "According to {standard} v[version] requirement [X.Y.Z] (Page [N])"
   - Include relevant testing procedures and guidance

2. Hierarchical Information
   - Present main requirements first
   - Follow with specific sub-requirements
   - Include associated testing procedures
   - Add implementation guidance and notes

3. Practical Application
   - Explain technical terms in [brackets]
   - Provide step-by-step implementation guidance
   - List prerequisites and dependencies
   - Cross-reference related requirements

4. Scope and Context
   - Specify the exact scope of each requirement
   - Note any conditions or exceptions
   - Reference specific sections for more details

Format your response to:
1. Maintain exact {standard} language with proper citations
2. Include page numbers for all references
3. Organize information hierarchically
4. Provide clear implementation guidance"#,
            standard = standard,
            query = query,
            context = context.text,
        )
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        generate_with_deadline(self.generator.as_ref(), prompt, self.generation_timeout).await
    }
}

/// Run a generation call under a deadline; expiry is a `Timeout` error,
/// which callers treat as the service being unavailable
pub(crate) async fn generate_with_deadline(
    generator: &dyn Generator,
    prompt: &str,
    timeout: Duration,
) -> Result<String> {
    match tokio::time::timeout(timeout, generator.generate(prompt)).await {
        Ok(result) => result,
        Err(_) => Err(RagError::Timeout {
            operation: "generation".to_string(),
            duration_ms: timeout.as_millis() as u64,
        }),
    }
}
