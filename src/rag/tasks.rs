// Advisory tasks: compliance check, policy draft, risk assessment, implementation plan
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::errors::{RagError, Result};
use crate::index::IndexHit;
use crate::llm::Generator;
use crate::rag::pipeline::generate_with_deadline;
use crate::rag::retrieval::RetrievalOrchestrator;

/// Kinds of advisory output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvisoryTask {
    Compliance,
    Policy,
    Risk,
    Plan,
}

impl AdvisoryTask {
    /// Phrase used in error messages
    fn activity(&self) -> &'static str {
        match self {
            AdvisoryTask::Compliance => "compliance analysis",
            AdvisoryTask::Policy => "policy generation",
            AdvisoryTask::Risk => "risk assessment",
            AdvisoryTask::Plan => "implementation planning",
        }
    }

    fn empty_output_error(&self) -> &'static str {
        match self {
            AdvisoryTask::Compliance => {
                "Could not generate analysis. Please provide more specific requirements."
            }
            AdvisoryTask::Policy => "Could not generate policy. Please specify a valid policy type.",
            AdvisoryTask::Risk => {
                "Could not generate risk assessment. Please try again with more specific scenario details."
            }
            AdvisoryTask::Plan => {
                "Could not generate implementation plan. Please provide more specific requirements."
            }
        }
    }

    /// Task-framed search query
    pub fn search_query(&self, standard: &str, input: &str) -> String {
        match self {
            AdvisoryTask::Compliance | AdvisoryTask::Risk => {
                format!("{} requirements and controls related to: {}", standard, input)
            }
            AdvisoryTask::Policy => {
                format!("{} requirements and controls for {} policy", standard, input)
            }
            AdvisoryTask::Plan => format!(
                "{} implementation details for: {}\nInclude:\n- Requirement specifications\n- Testing procedures\n- Implementation guidance\n- Technical requirements",
                standard, input
            ),
        }
    }
}

impl std::fmt::Display for AdvisoryTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AdvisoryTask::Compliance => "compliance",
            AdvisoryTask::Policy => "policy",
            AdvisoryTask::Risk => "risk",
            AdvisoryTask::Plan => "plan",
        };
        f.write_str(name)
    }
}

/// Runs advisory tasks over the shared index and generator
pub struct AdvisoryService {
    orchestrator: Arc<RetrievalOrchestrator>,
    generator: Arc<dyn Generator>,
    standard: String,
    generation_timeout: Duration,
}

impl AdvisoryService {
    pub fn new(
        orchestrator: Arc<RetrievalOrchestrator>,
        generator: Arc<dyn Generator>,
        standard: impl Into<String>,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            orchestrator,
            generator,
            standard: standard.into(),
            generation_timeout,
        }
    }

    /// Run a task; failures come back as a JSON error object
    pub async fn run(&self, task: AdvisoryTask, input: &str) -> String {
        match self.try_run(task, input).await {
            Ok(Some(output)) => output,
            Ok(None) => error_json(task.empty_output_error()),
            Err(e) => {
                error!(%task, error = %e, "advisory task failed");
                error_json(&format!("Error in {}: {}", task.activity(), e))
            }
        }
    }

    async fn try_run(&self, task: AdvisoryTask, input: &str) -> Result<Option<String>> {
        let query = task.search_query(&self.standard, input);
        let hits = self.orchestrator.search(&query, self.orchestrator.k()).await?;
        info!(%task, hits = hits.len(), "advisory context retrieved");

        let context = join_context(&hits);
        let prompt = self.build_prompt(task, input, context.as_deref());
        let output = generate_with_deadline(self.generator.as_ref(), &prompt, self.generation_timeout)
            .await?;
        let output = output.trim();
        if output.is_empty() {
            return Ok(None);
        }

        match task {
            AdvisoryTask::Risk => {
                let framework = match hits.first() {
                    Some(hit) => format!("{} v{}", self.standard, hit.metadata.version),
                    None => "General Security Best Practices".to_string(),
                };
                let envelope = json!({
                    "timestamp": Utc::now().to_rfc3339(),
                    "scenario": input,
                    "risk_assessment": output,
                    "metadata": {
                        "assessment_type": "comprehensive",
                        "confidence_level": "high",
                        "framework": framework,
                    },
                });
                serde_json::to_string_pretty(&envelope)
                    .map(Some)
                    .map_err(RagError::from)
            }
            _ => Ok(Some(output.to_string())),
        }
    }

    /// Task prompt; `context` is `None` when retrieval found nothing
    pub fn build_prompt(&self, task: AdvisoryTask, input: &str, context: Option<&str>) -> String {
        let standard = &self.standard;
        let context_line = match context {
            Some(text) => format!("{} Context: {}", standard, text),
            None => match task {
                AdvisoryTask::Risk => {
                    "Note: Using general security and risk assessment knowledge.".to_string()
                }
                AdvisoryTask::Plan => {
                    "Note: Using general security implementation knowledge.".to_string()
                }
                _ => "Note: Using general security and compliance knowledge.".to_string(),
            },
        };
        let grounded = context.is_some();
        let target = if grounded {
            format!("{} compliance", standard)
        } else {
            "security compliance".to_string()
        };

        match task {
            AdvisoryTask::Compliance => format!(
                "You are a compliance specialist. Analyze the following {standard} requirements and provide a detailed compliance review.

Requirements to Check: {input}

{context_line}

Structure your response into the following sections:
1. **Requirements Mapped**:
   - {mapping}
2. **Compliance Status**:
   - Indicate whether the requirement is compliant, partially compliant, or non-compliant.
   - For non-compliant sections, explain why.
3. **Gap Analysis**:
   - Identify any gaps between the requirements and the current state of compliance.
4. **Implementation Recommendations**:
   - Suggest actions, including controls, strategies, and technical specifications to close the gaps.
5. **Detailed JSON Output**:
   - Provide a detailed JSON response including the compliance status, gap analysis, and implementation guidance.

{closing}",
                mapping = if grounded {
                    format!("Clearly map each of the requirements to the relevant {} sections, indicating the section numbers and relevant clauses.", standard)
                } else {
                    "Map requirements to relevant security frameworks and standards (ISO 27001, NIST, etc.).".to_string()
                },
                closing = if grounded {
                    format!("Use specific {} references and requirements.", standard)
                } else {
                    "Draw from general security frameworks and best practices.".to_string()
                },
            ),
            AdvisoryTask::Policy => format!(
                "You are creating a detailed policy for {target}.

Policy Type: {input}
{context_line}

**Policy Breakdown**:
1. **Policy Overview**:
   - Provide an introduction to the policy's purpose and why it is critical for {target}.

2. **Scope and Applicability**:
   - Define who and what is affected by the policy.

3. **Specific Requirements**:
   - {requirements}

4. **Governance**:
   - Define the roles, responsibilities, and decision-making processes for the policy.

5. **Controls**:
   - Provide actionable controls required for compliance.

6. **Audit Procedures**:
   - Outline audit methods and procedures to verify policy adherence.

Format the response as a detailed JSON policy document.",
                requirements = if grounded {
                    format!("List the specific {} sections covered by this policy.", standard)
                } else {
                    "List the specific security requirements and standards covered by this policy.".to_string()
                },
            ),
            AdvisoryTask::Risk => format!(
                "You are performing a comprehensive risk assessment for a security scenario.

Scenario: {input}
{context_line}

**Assessment Structure**:
1. **Executive Summary**:
   - Summarize the key risks and outcomes of the assessment.

2. **Risk Identification**:
   - List and assess potential risks in the given scenario.

3. **{heading}**:
   - {detail}

4. **Required Controls**:
   - Define the necessary technical and operational controls to mitigate risks.

5. **Mitigation Strategies**:
   - Provide a clear strategy for mitigating identified risks.

6. **Implementation Recommendations**:
   - Suggest practical, actionable steps to reduce risks and improve compliance.

Format the response as a detailed JSON assessment document.",
                heading = if grounded {
                    format!("{} Requirements Analysis", standard)
                } else {
                    "Security Requirements Analysis".to_string()
                },
                detail = if grounded {
                    format!("Detail the {} requirements that apply to the scenario.", standard)
                } else {
                    "Detail the security requirements and standards that apply to the scenario.".to_string()
                },
            ),
            AdvisoryTask::Plan => format!(
                "You are generating an implementation plan for {target}.

Requirement: {input}
{context_line}

**Plan Structure**:
1. **Overview**:
   - Provide a high-level overview of the requirement and its importance.

2. **Implementation Phases**:
   - **Phase 1: Assessment**: define the assessment requirements and necessary tools.
   - **Phase 2: Planning**: outline resources and timelines.
   - **Phase 3: Execution**: provide detailed technical steps.
   - **Phase 4: Testing**: include specific testing procedures to validate compliance.
   - **Phase 5: Maintenance**: define ongoing maintenance activities.

3. **Timeline and Resources**:
   - List the expected timeline for each phase and the required resources.

4. **Validation**:
   - Explain how to validate successful implementation and compliance.

Format the response as a detailed JSON implementation plan.",
            ),
        }
    }
}

/// Hit texts joined by blank lines, or `None` when there are none
fn join_context(hits: &[IndexHit]) -> Option<String> {
    if hits.is_empty() {
        return None;
    }
    Some(
        hits.iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"),
    )
}

fn error_json(message: &str) -> String {
    json!({
        "error": message,
        "timestamp": Utc::now().to_rfc3339(),
    })
    .to_string()
}
