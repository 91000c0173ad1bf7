//! 向量化 Provider
//!
//! 同一 provider/model 的输出是确定的；不同 provider 的向量不可混用，
//! 因此每个实现都给出稳定的 `id()`，写入向量库并在查询时校验。

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use md5::{Digest, Md5};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{EmbeddingConfig, EmbeddingProvider};

#[async_trait]
pub trait Embedder: Send + Sync {
    /// 稳定标识，形如 `hash:md5:d384`
    fn id(&self) -> String;

    /// 向量维度，远程 provider 在首次调用前可能未知
    fn dim(&self) -> Option<usize>;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Embedding provider returned no vector"))
    }
}

/// 根据配置创建向量化 Provider
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::Hash => Ok(Arc::new(HashEmbedder::new(config.dimension))),
        EmbeddingProvider::Ollama => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        EmbeddingProvider::OpenAI => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
    }
}

/// 基于哈希的确定性向量，离线与测试使用
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut hasher = Md5::new();
        hasher.update(text.as_bytes());
        let digest = hasher.finalize();
        let mut seed_bytes = [0u8; 8];
        seed_bytes.copy_from_slice(&digest[..8]);

        let mut rng = StdRng::seed_from_u64(u64::from_be_bytes(seed_bytes));
        let vector: Vec<f32> = (0..self.dim)
            .map(|_| rng.random_range(-1.0f32..1.0f32))
            .collect();
        l2_normalize(vector)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn id(&self) -> String {
        format!("hash:md5:d{}", self.dim)
    }

    fn dim(&self) -> Option<usize> {
        Some(self.dim)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn l2_normalize(vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector;
    }
    vector.into_iter().map(|x| x / norm).collect()
}

fn http_client(timeout_seconds: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .context("Failed to build HTTP client for embeddings")
}

/// Ollama `/api/embeddings`
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client: http_client(config.timeout_seconds)?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn id(&self) -> String {
        format!("ollama:{}", self.model)
    }

    fn dim(&self) -> Option<usize> {
        None
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let mut vectors = Vec::with_capacity(texts.len());

        for text in texts {
            let response = self
                .client
                .post(&url)
                .json(&OllamaEmbeddingRequest {
                    model: &self.model,
                    prompt: text,
                })
                .send()
                .await
                .context("Failed to send embedding request")?;

            if !response.status().is_success() {
                anyhow::bail!("Embedding request failed: {}", response.status());
            }

            let body: OllamaEmbeddingResponse = response
                .json()
                .await
                .context("Failed to parse embedding response")?;
            vectors.push(body.embedding);
        }

        Ok(vectors)
    }
}

/// OpenAI 兼容的 `/embeddings` 接口（DashScope 兼容模式同样适用）
pub struct OpenAIEmbedder {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OpenAIEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    /// DashScope 单次请求的输入条数上限
    const MAX_BATCH: usize = 10;

    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            anyhow::bail!("Embedding API key is not configured");
        }
        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            client: http_client(config.timeout_seconds)?,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn id(&self) -> String {
        format!("openai:{}", self.model)
    }

    fn dim(&self) -> Option<usize> {
        None
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(Self::MAX_BATCH) {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&OpenAIEmbeddingRequest {
                    model: &self.model,
                    input: batch,
                })
                .send()
                .await
                .context("Failed to send embedding request")?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("Embedding request failed: {} {}", status, body);
            }

            let mut body: OpenAIEmbeddingResponse = response
                .json()
                .await
                .context("Failed to parse embedding response")?;
            if body.data.len() != batch.len() {
                anyhow::bail!(
                    "Embedding response size mismatch: expected {}, got {}",
                    batch.len(),
                    body.data.len()
                );
            }
            body.data.sort_by_key(|d| d.index);
            vectors.extend(body.data.into_iter().map(|d| d.embedding));
        }

        Ok(vectors)
    }
}
