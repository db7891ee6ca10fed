//! Configuration management for compliance-rag
//!
//! TOML-based configuration with defaults.
//! Location: ~/.compliance-rag/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::document::builder::DEFAULT_STANDARD;
use crate::index::embedding::{DEFAULT_HASHING_DIM, DEFAULT_MODEL_ID};
use crate::rag::topics::{
    default_generic_fallback, default_topics, FallbackTable, TopicConfig, TopicTable,
};

/// Complete configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub standard: StandardConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default = "default_generic_fallback")]
    pub generic_fallback: String,
    #[serde(default = "default_topics")]
    pub topics: Vec<TopicConfig>,
}

/// Which standard the documents follow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardConfig {
    pub name: String,
}

/// Input and output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub source: PathBuf,
    pub structured_json: PathBuf,
}

/// Index backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Memory,
    Qdrant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub backend: IndexBackend,
    pub qdrant_url: String,
    pub collection: String,
}

/// Embedding backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    Hashing,
    Bert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub model_id: String,
    pub hashing_dimension: usize,
}

/// Ollama connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub host: String,
    pub port: u16,
    pub model: String,
    pub timeout_sec: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Results per search
    pub k: usize,
    /// Deadline for each index call
    pub search_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            standard: StandardConfig::default(),
            paths: PathsConfig::default(),
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
            generic_fallback: default_generic_fallback(),
            topics: default_topics(),
        }
    }
}

impl Default for StandardConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_STANDARD.to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let base = base_dir();
        Self {
            source: base.join("input").join("standard.txt"),
            structured_json: base.join("data").join("structured.json"),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Memory,
            qdrant_url: "http://localhost:6334".to_string(),
            collection: "requirements".to_string(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Hashing,
            model_id: DEFAULT_MODEL_ID.to_string(),
            hashing_dimension: DEFAULT_HASHING_DIM,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 11434,
            model: "qwen2.5:7b-instruct".to_string(),
            timeout_sec: 120,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 4,
            search_timeout_ms: 10_000,
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            let config = Config::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(&config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        fs::write(path, self.to_toml()?)
            .context("Failed to write config file")?;

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .context("Could not determine home directory")?;

        Ok(home.join(".compliance-rag").join("config.toml"))
    }

    /// Reject values that make retrieval meaningless
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.k == 0 {
            anyhow::bail!("retrieval.k must be at least 1");
        }
        if self.retrieval.search_timeout_ms == 0 {
            anyhow::bail!("retrieval.search_timeout_ms must be at least 1");
        }
        if self.llm.timeout_sec == 0 {
            anyhow::bail!("llm.timeout_sec must be at least 1");
        }
        if self.embedding.hashing_dimension == 0 {
            anyhow::bail!("embedding.hashing_dimension must be at least 1");
        }
        let mut names: Vec<&str> = self.topics.iter().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            anyhow::bail!("topic names must be unique");
        }
        Ok(())
    }

    pub fn topic_table(&self) -> TopicTable {
        TopicTable::from_config(&self.topics)
    }

    pub fn fallback_table(&self) -> FallbackTable {
        FallbackTable::from_config(&self.topics, &self.generic_fallback)
    }

    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.llm.host, self.llm.port)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.retrieval.search_timeout_ms)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_sec)
    }
}

/// Base directory for data files
fn base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".compliance-rag")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.retrieval.k, 4);
        assert_eq!(config.standard.name, "PCI DSS");
        assert_eq!(config.index.backend, IndexBackend::Memory);
        assert_eq!(config.topics.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_string = config.to_toml().unwrap();
        assert!(toml_string.contains("[[topics]]"));

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(deserialized.topics, config.topics);
        assert_eq!(deserialized.llm.model, config.llm.model);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [retrieval]
            k = 8
            search_timeout_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.retrieval.k, 8);
        assert_eq!(config.search_timeout(), Duration::from_millis(500));
        assert_eq!(config.topics.len(), 4);
        assert_eq!(config.llm.port, 11434);
    }

    #[test]
    fn test_custom_topics_replace_defaults() {
        let config: Config = toml::from_str(
            r#"
            [[topics]]
            name = "network"
            keywords = ["firewall", "segmentation"]
            guidance = "Include network controls"
            fallback = "Segment your network."
            "#,
        )
        .unwrap();

        let table = config.topic_table();
        assert_eq!(table.len(), 1);
        let fallbacks = config.fallback_table();
        assert_eq!(
            fallbacks.for_topics(&["network".to_string()]).map(|(_, t)| t),
            Some("Segment your network.")
        );
    }

    #[test]
    fn test_validate_rejects_zero_k() {
        let mut config = Config::default();
        config.retrieval.k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let mut config = Config::default();
        config.retrieval.search_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.llm.timeout_sec = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_topics() {
        let mut config = Config::default();
        config.topics.push(config.topics[0].clone());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(config.retrieval.k, 4);

        let reloaded = Config::load(Some(&path)).unwrap();
        assert_eq!(reloaded.topics, config.topics);
    }

    #[test]
    fn test_ollama_url() {
        assert_eq!(Config::default().ollama_url(), "http://127.0.0.1:11434");
    }
}
