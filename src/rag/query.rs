//! Query classification: requirement references, topics and query expansion

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::document::types::{REQUIREMENT_TYPE, SUBREQUIREMENT_TYPE};
use crate::rag::topics::TopicTable;

/// What kind of clause a reference names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    Requirement,
    Testing,
    Guidance,
}

impl RefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::Requirement => "requirement",
            RefKind::Testing => "testing",
            RefKind::Guidance => "guidance",
        }
    }
}

impl std::fmt::Display for RefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An explicit clause reference found in a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementRef {
    pub number: String,
    pub kind: RefKind,
}

impl RequirementRef {
    /// Leading segment of a dotted number, if there is one
    pub fn parent_number(&self) -> Option<&str> {
        self.number.split_once('.').map(|(parent, _)| parent)
    }

    /// Chunk type to filter on for an exact lookup
    ///
    /// Requirement references map onto the indexed chunk types: dotted
    /// numbers are sub-requirements, bare numbers are requirements.
    pub fn filter_type(&self) -> &'static str {
        match self.kind {
            RefKind::Requirement if self.number.contains('.') => SUBREQUIREMENT_TYPE,
            RefKind::Requirement => REQUIREMENT_TYPE,
            other => other.as_str(),
        }
    }
}

/// Per-query classification result; never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryContext {
    pub raw_query: String,
    pub requirement_ref: Option<RequirementRef>,
    /// Detected topics, in topic table order
    pub topics: Vec<String>,
    pub enhanced_query: String,
}

impl QueryContext {
    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.iter().any(|t| t == topic)
    }
}

fn reference_patterns() -> &'static [(RefKind, Regex)] {
    static PATTERNS: OnceLock<Vec<(RefKind, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (RefKind::Requirement, r"\b(?:requirement|req\.?|r)\s*[-:]?\s*(\d+(?:\.\d+)?(?:\.\d+)?)"),
            (RefKind::Testing, r"\b(?:testing procedure|test|tp)\s*[-:]?\s*(\d+(?:\.\d+)?(?:\.\d+)?)"),
            (RefKind::Guidance, r"\b(?:guidance|guide|g)\s*[-:]?\s*(\d+(?:\.\d+)?(?:\.\d+)?)"),
        ]
        .into_iter()
        .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("valid reference regex")))
        .collect()
    })
}

/// Classifies free-text questions
pub struct QueryClassifier;

impl QueryClassifier {
    pub fn classify(raw_query: &str, topics: &TopicTable) -> QueryContext {
        let lowered = raw_query.to_lowercase();

        let detected: Vec<&crate::rag::topics::Topic> = topics
            .iter()
            .filter(|topic| topic.keywords.iter().any(|k| lowered.contains(k.as_str())))
            .collect();

        let mut enhanced_query = raw_query.to_string();
        for topic in &detected {
            enhanced_query.push('\n');
            enhanced_query.push_str(&topic.guidance);
        }

        QueryContext {
            raw_query: raw_query.to_string(),
            requirement_ref: Self::detect_reference(&lowered),
            topics: detected.iter().map(|t| t.name.clone()).collect(),
            enhanced_query,
        }
    }

    /// First pattern in priority order that matches anywhere wins
    fn detect_reference(lowered: &str) -> Option<RequirementRef> {
        reference_patterns().iter().find_map(|(kind, pattern)| {
            pattern.captures(lowered).map(|caps| RequirementRef {
                number: caps[1].to_string(),
                kind: *kind,
            })
        })
    }
}
