//! Topic keyword and fallback text tables
//!
//! Both tables are built once from configuration and shared read-only.
//! Iteration order is the configured order; it decides the order guidance
//! blocks are appended in and which fallback wins.

use serde::{Deserialize, Serialize};

/// One configured topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfig {
    pub name: String,
    pub keywords: Vec<String>,
    /// Hint block appended to semantic queries that mention the topic
    pub guidance: String,
    /// Canned answer used when retrieval finds nothing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

/// A topic with lower-cased keywords, ready for matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub name: String,
    pub keywords: Vec<String>,
    pub guidance: String,
}

/// Ordered topic → keywords/guidance table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicTable {
    topics: Vec<Topic>,
}

impl TopicTable {
    pub fn from_config(topics: &[TopicConfig]) -> Self {
        Self {
            topics: topics
                .iter()
                .map(|t| Topic {
                    name: t.name.clone(),
                    keywords: t.keywords.iter().map(|k| k.to_lowercase()).collect(),
                    guidance: t.guidance.clone(),
                })
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.topics.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

/// Ordered topic → canned fallback table plus the generic text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackTable {
    entries: Vec<(String, String)>,
    generic: String,
}

impl FallbackTable {
    pub fn from_config(topics: &[TopicConfig], generic: &str) -> Self {
        Self {
            entries: topics
                .iter()
                .filter_map(|t| t.fallback.as_ref().map(|f| (t.name.clone(), f.clone())))
                .collect(),
            generic: generic.to_string(),
        }
    }

    /// First configured fallback whose topic was detected
    pub fn for_topics(&self, detected: &[String]) -> Option<(&str, &str)> {
        self.entries
            .iter()
            .find(|(topic, _)| detected.iter().any(|d| d == topic))
            .map(|(topic, text)| (topic.as_str(), text.as_str()))
    }

    pub fn generic(&self) -> &str {
        &self.generic
    }
}

/// Default topic table
pub fn default_topics() -> Vec<TopicConfig> {
    vec![
        TopicConfig {
            name: "cloud".to_string(),
            keywords: words(&["cloud", "aws", "azure", "gcp", "saas", "hosting"]),
            guidance: "Include:
- Cloud service provider requirements
- Shared responsibility model
- Data residency requirements
- Cloud-specific security controls"
                .to_string(),
            fallback: Some(
                "While specific standard context is not available, here are important cloud security considerations:
1. Data Classification and Storage
   - Identify and classify sensitive data
   - Implement appropriate storage controls
   - Monitor data access and movement

2. Cloud Service Provider Security
   - Evaluate provider security certifications
   - Review the shared responsibility model
   - Implement additional security controls

3. Compliance Requirements
   - Maintain data sovereignty
   - Implement encryption
   - Run regular security assessments

4. Risk Mitigation
   - Test backup and recovery regularly
   - Plan incident response
   - Monitor and alert on security events"
                    .to_string(),
            ),
        },
        TopicConfig {
            name: "storage".to_string(),
            keywords: words(&["storage", "database", "backup", "repository"]),
            guidance: "Include:
- Data storage requirements
- Backup and recovery procedures
- Data retention policies
- Storage security controls"
                .to_string(),
            fallback: Some(
                "General best practices for secure data storage:
1. Data Protection
   - Encryption at rest and in transit
   - Access control mechanisms
   - Regular backup procedures

2. Security Controls
   - Monitoring and logging
   - Intrusion detection
   - Data loss prevention

3. Compliance Measures
   - Regular audits
   - Policy enforcement
   - Documentation maintenance"
                    .to_string(),
            ),
        },
        TopicConfig {
            name: "encryption".to_string(),
            keywords: words(&["encrypt", "cryptography", "cipher", "key"]),
            guidance: "Include:
- Encryption requirements
- Key management procedures
- Cryptographic standards
- Implementation guidance"
                .to_string(),
            fallback: None,
        },
        TopicConfig {
            name: "access".to_string(),
            keywords: words(&["access", "authentication", "authorization", "permission"]),
            guidance: "Include:
- Access control requirements
- Authentication methods
- Authorization procedures
- Audit requirements"
                .to_string(),
            fallback: None,
        },
    ]
}

/// Default answer when no topic fallback applies
pub fn default_generic_fallback() -> String {
    "While specific standard guidance is not available, here are general security best practices:
1. Risk Assessment
   - Identify potential threats
   - Evaluate vulnerabilities
   - Implement controls

2. Security Controls
   - Access control
   - Encryption
   - Monitoring

3. Compliance
   - Regular audits
   - Policy enforcement
   - Documentation

Please consult a qualified security assessor for specific compliance requirements."
        .to_string()
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}
