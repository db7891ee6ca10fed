//! Text embedding backends
//!
//! `BertEmbedder` runs a sentence-transformer locally through Candle.
//! `HashingEmbedder` needs no model and is what the in-memory index uses by
//! default and in tests.

use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::sync::Arc;
use tokenizers::Tokenizer;
use xxhash_rust::xxh3::xxh3_64;

/// Default sentence-transformer model
pub const DEFAULT_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Default hashing dimension
pub const DEFAULT_HASHING_DIM: usize = 512;

/// Turns text into fixed-size vectors
pub trait Embedder: Send + Sync {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .pop()
            .context("Embedder returned no vector")
    }
}

/// Embed a single query off the async runtime
///
/// Model inference is CPU-bound; running it on the blocking pool keeps a
/// caller's `tokio::time::timeout` able to fire.
pub async fn embed_query(embedder: &Arc<dyn Embedder>, text: &str) -> Result<Vec<f32>> {
    let embedder = Arc::clone(embedder);
    let text = text.to_string();
    tokio::task::spawn_blocking(move || embedder.embed(&text))
        .await
        .context("Embedding task failed")?
}

/// Deterministic token-hashing embedder
///
/// Lower-cased alphanumeric tokens are hashed with XXH3-64 into buckets; the
/// result is L2-normalised so cosine similarity reduces to a dot product.
/// Bucket assignment must stay fixed across builds since vectors are persisted.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        (xxh3_64(token.to_lowercase().as_bytes()) % self.dimension as u64) as usize
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            embedding[self.bucket(token)] += 1.0;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in &mut embedding {
                *val /= magnitude;
            }
        }

        embedding
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIM)
    }
}

impl Embedder for HashingEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// BERT sentence embedder via Candle
pub struct BertEmbedder {
    model: Arc<BertModel>,
    tokenizer: Arc<Tokenizer>,
    device: Device,
    dimension: usize,
}

impl BertEmbedder {
    /// Load a model from the HuggingFace Hub (downloads on first use)
    pub fn new(model_id: &str) -> Result<Self> {
        let device = Device::Cpu;

        let api = Api::new().context("Failed to create HuggingFace API client")?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo.get("config.json")
            .context("Failed to download model config")?;
        let tokenizer_path = repo.get("tokenizer.json")
            .context("Failed to download tokenizer")?;
        let weights_path = repo.get("model.safetensors")
            .context("Failed to download model weights")?;

        let config_contents = std::fs::read_to_string(config_path)
            .context("Failed to read config file")?;
        let config: Config = serde_json::from_str(&config_contents)
            .context("Failed to parse model config")?;
        let dimension = serde_json::from_str::<serde_json::Value>(&config_contents)
            .ok()
            .and_then(|v| v.get("hidden_size").and_then(|h| h.as_u64()))
            .context("Model config has no hidden_size")? as usize;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

        // SAFETY: the weights file is owned by the hub cache and not mutated while mapped
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], candle_core::DType::F32, &device)
                .context("Failed to load model weights")?
        };

        let model = BertModel::load(vb, &config).context("Failed to create BERT model")?;

        Ok(Self {
            model: Arc::new(model),
            tokenizer: Arc::new(tokenizer),
            device,
            dimension,
        })
    }

    /// Mean pooling with attention mask
    fn mean_pool(embeddings: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        let mask_expanded = attention_mask
            .unsqueeze(2)?
            .expand(embeddings.shape())?
            .to_dtype(embeddings.dtype())?;

        let sum_embeddings = (embeddings * &mask_expanded)?.sum(1)?;
        let sum_mask = mask_expanded.sum(1)?.clamp(1e-9, f64::MAX)?;

        Ok(sum_embeddings.broadcast_div(&sum_mask)?)
    }
}

impl Embedder for BertEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self.tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        let batch_size = texts.len();

        let mut padded_ids = vec![0u32; batch_size * max_len];
        let mut padded_mask = vec![0u32; batch_size * max_len];
        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            padded_ids[i * max_len..i * max_len + ids.len()].copy_from_slice(ids);
            padded_mask[i * max_len..i * max_len + mask.len()].copy_from_slice(mask);
        }

        let token_ids = Tensor::from_vec(padded_ids, (batch_size, max_len), &self.device)?;
        let attention_mask = Tensor::from_vec(padded_mask, (batch_size, max_len), &self.device)?;
        let token_type_ids = token_ids.zeros_like()?;

        let embeddings = self
            .model
            .forward(&token_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = Self::mean_pool(&embeddings, &attention_mask)?;

        Ok(pooled.to_vec2::<f32>()?)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Cosine similarity; zero when either vector is empty or zero
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashing_dimension_and_norm() {
        let embedder = HashingEmbedder::new(64);
        let v = embedder.embed("Protect stored cardholder data").unwrap();
        assert_eq!(v.len(), 64);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_is_deterministic_and_case_insensitive() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("Encrypt Transmission").unwrap();
        let b = embedder.embed("encrypt transmission").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_hashing_buckets_are_xxh3() {
        // XXH3-64 of the empty input is a published constant
        assert_eq!(xxh3_64(b""), 0x2D06_8005_38D3_94C2);

        let embedder = HashingEmbedder::new(DEFAULT_HASHING_DIM);
        let v = embedder.embed("Firewall").unwrap();
        let expected = (xxh3_64(b"firewall") % DEFAULT_HASHING_DIM as u64) as usize;
        assert_eq!(embedder.bucket("FIREWALL"), expected);
        assert_eq!(v[expected], 1.0);
    }

    #[test]
    fn test_hashing_similarity_prefers_overlap() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed("encryption key management").unwrap();
        let close = embedder.embed("key management for encryption keys").unwrap();
        let far = embedder.embed("visitor badges at the front desk").unwrap();
        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let v = HashingEmbedder::new(8).embed("").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(cosine_similarity(&v, &v), 0.0);
    }

    #[test]
    #[ignore] // Integration test - requires model download
    fn test_bert_embedding_dimension() {
        let embedder = BertEmbedder::new(DEFAULT_MODEL_ID).expect("Failed to create embedder");
        let embeddings = embedder.embed_batch(&["Hello", "World"]).unwrap();
        assert_eq!(embeddings.len(), 2);
        assert!(embeddings.iter().all(|e| e.len() == embedder.dimension()));
    }
}
