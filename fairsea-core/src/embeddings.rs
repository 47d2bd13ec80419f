//! Pluggable embedding providers for the similarity categorizer.
//!
//! Provides a trait-based abstraction over embedding models, with implementations
//! for a local hashing embedder (always available), the Ollama API and the OpenAI API.
//! Every provider returns L2-normalized vectors so cosine similarity is a dot product.

use crate::error::FairseaError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Trait for embedding providers.
///
/// A failed call fails the whole batch; callers treat it as fatal for the
/// categorization that needed it.
pub trait Embedder: Send + Sync {
    /// Generate embeddings for a batch of texts, in input order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, FairseaError>;

    /// Generate an embedding for a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, FairseaError> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| FairseaError::embedding("provider returned no vectors"))
    }

    /// Return the dimensionality of embeddings.
    fn dimensions(&self) -> usize;

    /// Return the provider name.
    fn provider_name(&self) -> &str;
}

/// Configuration for embedding providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name: "local" (default), "ollama", "openai"
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Provider-specific model name.
    #[serde(default)]
    pub model: Option<String>,
    /// Embedding dimensions for the local provider (0 = default).
    #[serde(default)]
    pub dimensions: usize,
    /// Batch size for bulk embedding operations.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Override of the provider endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Request timeout in seconds for remote providers.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Environment variable holding the OpenAI API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_provider() -> String {
    "local".into()
}

fn default_batch_size() -> usize {
    32
}

fn default_timeout() -> u64 {
    30
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}

const DEFAULT_LOCAL_DIMENSIONS: usize = 256;

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dimensions: 0,
            batch_size: default_batch_size(),
            base_url: None,
            timeout_secs: default_timeout(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// L2-normalize in place. Zero vectors stay zero.
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Local hashing embedder (always available, no external dependencies).
///
/// Each lowercase word and each of its character trigrams is hashed into a
/// dimension, so morphologically related words ("authoritarian",
/// "authoritative") land close together.
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dimensions: usize,
}

impl LocalEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            return vector;
        }

        let mut tf: HashMap<&str, usize> = HashMap::new();
        for word in &words {
            *tf.entry(word).or_insert(0) += 1;
        }

        for (term, count) in &tf {
            let weight = *count as f32;
            vector[simple_hash(term) % self.dimensions] += weight;

            let padded: Vec<char> = format!("#{term}#").chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                vector[simple_hash(&gram) % self.dimensions] += 0.5 * weight;
            }
        }

        normalize(&mut vector);
        vector
    }
}

fn simple_hash(s: &str) -> usize {
    let mut hash: usize = 5381;
    for b in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(b as usize);
    }
    hash
}

impl Embedder for LocalEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, FairseaError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "local"
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::blocking::Client, FairseaError> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

fn parse_vector(value: &serde_json::Value) -> Result<Vec<f32>, FairseaError> {
    let mut vector = value
        .as_array()
        .ok_or_else(|| FairseaError::embedding("embedding is not an array"))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| FairseaError::embedding("non-numeric embedding component"))
        })
        .collect::<Result<Vec<f32>, _>>()?;
    normalize(&mut vector);
    Ok(vector)
}

/// OpenAI API embedder (uses text-embedding-3-small by default).
pub struct OpenAiEmbedder {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    dims: usize,
    base_url: String,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, FairseaError> {
        let model = model.unwrap_or_else(|| "text-embedding-3-small".into());
        let dims = match model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        };
        Ok(Self {
            client: http_client(timeout_secs)?,
            api_key,
            model,
            dims,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com".into()),
        })
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, FairseaError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?
            .error_for_status()?;
        let json: serde_json::Value = resp.json()?;

        let mut data = json["data"]
            .as_array()
            .ok_or_else(|| FairseaError::embedding("OpenAI response has no data array"))?
            .clone();
        data.sort_by_key(|item| item["index"].as_u64().unwrap_or(0));
        let vectors = data
            .iter()
            .map(|item| parse_vector(&item["embedding"]))
            .collect::<Result<Vec<_>, _>>()?;

        if vectors.len() != texts.len() {
            return Err(FairseaError::embedding(format!(
                "OpenAI returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

/// Ollama embedder (uses local Ollama API).
pub struct OllamaEmbedder {
    client: reqwest::blocking::Client,
    model: String,
    dims: usize,
    base_url: String,
}

impl OllamaEmbedder {
    pub fn new(
        model: Option<String>,
        base_url: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, FairseaError> {
        let model = model.unwrap_or_else(|| "all-minilm".into());
        let dims = match model.as_str() {
            "nomic-embed-text" => 768,
            "mxbai-embed-large" => 1024,
            "all-minilm" => 384,
            _ => 768,
        };
        Ok(Self {
            client: http_client(timeout_secs)?,
            model,
            dims,
            base_url: base_url.unwrap_or_else(|| "http://localhost:11434".into()),
        })
    }
}

impl Embedder for OllamaEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, FairseaError> {
        let url = format!("{}/api/embed", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()?
            .error_for_status()?;
        let json: serde_json::Value = resp.json()?;

        let vectors = json["embeddings"]
            .as_array()
            .ok_or_else(|| FairseaError::embedding("Ollama response has no embeddings"))?
            .iter()
            .map(parse_vector)
            .collect::<Result<Vec<_>, _>>()?;

        if vectors.len() != texts.len() {
            return Err(FairseaError::embedding(format!(
                "Ollama returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }
}

/// Factory function to create an embedder based on configuration.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>, FairseaError> {
    let local_dims = if config.dimensions > 0 {
        config.dimensions
    } else {
        DEFAULT_LOCAL_DIMENSIONS
    };

    match config.provider.as_str() {
        "local" => Ok(Box::new(LocalEmbedder::new(local_dims))),
        "ollama" => Ok(Box::new(OllamaEmbedder::new(
            config.model.clone(),
            config.base_url.clone(),
            config.timeout_secs,
        )?)),
        "openai" => {
            let api_key = std::env::var(&config.api_key_env).unwrap_or_default();
            if api_key.is_empty() {
                tracing::warn!(
                    env = %config.api_key_env,
                    "OpenAI API key not set, falling back to local embedder"
                );
                Ok(Box::new(LocalEmbedder::new(local_dims)))
            } else {
                Ok(Box::new(OpenAiEmbedder::new(
                    api_key,
                    config.model.clone(),
                    config.base_url.clone(),
                    config.timeout_secs,
                )?))
            }
        }
        other => Err(FairseaError::config(format!(
            "unknown embedding provider '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_local_embedder_dimensions() {
        let embedder = LocalEmbedder::new(128);
        assert_eq!(embedder.dimensions(), 128);
        let v = embedder.embed("hello world").unwrap();
        assert_eq!(v.len(), 128);
    }

    #[test]
    fn test_local_embedder_normalized() {
        let embedder = LocalEmbedder::new(128);
        let v = embedder.embed("test input text for normalization").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!(
            (norm - 1.0).abs() < 0.01,
            "Expected normalized vector, got norm={}",
            norm
        );
    }

    #[test]
    fn test_local_embedder_empty_text() {
        let embedder = LocalEmbedder::new(128);
        let v = embedder.embed("").unwrap();
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_local_embedder_deterministic() {
        let embedder = LocalEmbedder::new(128);
        assert_eq!(
            embedder.embed("same text").unwrap(),
            embedder.embed("same text").unwrap()
        );
    }

    #[test]
    fn test_local_embedder_related_words_closer() {
        let embedder = LocalEmbedder::new(512);
        let a = embedder.embed("authoritarian").unwrap();
        let b = embedder.embed("authoritative").unwrap();
        let c = embedder.embed("hesitant").unwrap();
        assert!(dot(&a, &b) > dot(&a, &c));
    }

    #[test]
    fn test_embed_batch_order() {
        let embedder = LocalEmbedder::new(64);
        let batch = embedder.embed_batch(&["hello", "world", "test"]).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[1], embedder.embed("world").unwrap());
    }

    #[test]
    fn test_embedding_config_defaults() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, "local");
        assert!(config.model.is_none());
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_embedding_config_deserialize_empty() {
        let config: EmbeddingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.provider, "local");
        assert_eq!(config.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_create_embedder_default() {
        let embedder = create_embedder(&EmbeddingConfig::default()).unwrap();
        assert_eq!(embedder.provider_name(), "local");
        assert_eq!(embedder.dimensions(), DEFAULT_LOCAL_DIMENSIONS);
    }

    #[test]
    fn test_create_embedder_openai_without_key_falls_back() {
        let config = EmbeddingConfig {
            provider: "openai".into(),
            api_key_env: "FAIRSEA_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..Default::default()
        };
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.provider_name(), "local");
    }

    #[test]
    fn test_create_embedder_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "word2vec".into(),
            ..Default::default()
        };
        assert!(create_embedder(&config).is_err());
    }

    #[test]
    fn test_ollama_embedder_dimensions() {
        let embedder = OllamaEmbedder::new(Some("nomic-embed-text".into()), None, 5).unwrap();
        assert_eq!(embedder.dimensions(), 768);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let mut v = vec![0.0f32; 4];
        normalize(&mut v);
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
