//! Generative-language service boundary

pub mod client;

use async_trait::async_trait;

use crate::errors::Result;

pub use client::{OllamaClient, DEFAULT_MODEL, DEFAULT_OLLAMA_URL};

/// Text generation from a single prompt; may fail, never retried here
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}
