//! 向量库
//!
//! 查询接口只约定形状：按元数据过滤、按相似度排序、返回 Top-k。
//! `LocalVectorStore` 是一个以JSON文件持久化的内存实现。

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};
use crate::types::{ChunkMetadata, MetadataPredicate};

/// 写入向量库的一条记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    /// `source_name::chunk_id`
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

/// 一条查询命中
#[derive(Debug, Clone, PartialEq)]
pub struct StoreHit {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// 余弦相似度
    pub score: f32,
}

impl StoreHit {
    pub fn distance(&self) -> f32 {
        1.0 - self.score
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 建库时使用的向量化 Provider 标识
    fn embedder_id(&self) -> &str;

    /// 写入记录，同id覆盖；返回写入条数
    async fn add(&self, records: Vec<StoreRecord>) -> Result<usize>;

    /// 按过滤条件返回相似度最高的 `top_k` 条，按相似度降序
    async fn query(
        &self,
        filter: &MetadataPredicate,
        top_k: usize,
        embedding: &[f32],
    ) -> Result<Vec<StoreHit>>;

    async fn count(&self, filter: Option<&MetadataPredicate>) -> Result<usize>;
}

#[derive(Serialize, Deserialize)]
struct PersistedStore {
    version: u32,
    embedder_id: String,
    records: Vec<StoreRecord>,
}

const STORE_VERSION: u32 = 1;

/// 以JSON文件持久化的本地向量库
pub struct LocalVectorStore {
    path: PathBuf,
    embedder_id: String,
    records: RwLock<Vec<StoreRecord>>,
}

impl LocalVectorStore {
    /// 打开已有向量库用于查询；文件不存在或向量化 Provider 不一致时报错
    pub async fn open(path: &Path, embedder_id: &str) -> PipelineResult<Self> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(PipelineError::KnowledgeBaseMissing(path.to_path_buf()));
        }

        let persisted = Self::read_file(path)
            .await
            .map_err(|e| PipelineError::Store(format!("{:#}", e)))?;

        if persisted.embedder_id != embedder_id {
            return Err(PipelineError::EmbedderMismatch {
                expected: embedder_id.to_string(),
                found: persisted.embedder_id,
            });
        }

        info!(
            path = %path.display(),
            records = persisted.records.len(),
            "Loaded vector store"
        );

        Ok(Self {
            path: path.to_path_buf(),
            embedder_id: persisted.embedder_id,
            records: RwLock::new(persisted.records),
        })
    }

    /// 打开或新建向量库用于写入；`reset` 时丢弃已有内容
    pub async fn create(path: &Path, embedder_id: &str, reset: bool) -> PipelineResult<Self> {
        let exists = tokio::fs::try_exists(path).await.unwrap_or(false);
        if exists && !reset {
            return Self::open(path, embedder_id).await;
        }

        if exists {
            info!(path = %path.display(), "Resetting vector store");
        }

        let store = Self {
            path: path.to_path_buf(),
            embedder_id: embedder_id.to_string(),
            records: RwLock::new(Vec::new()),
        };
        store
            .persist(&[])
            .await
            .map_err(|e| PipelineError::Store(format!("{:#}", e)))?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(path: &Path) -> Result<PersistedStore> {
        let data = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read vector store: {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse vector store: {}", path.display()))
    }

    async fn persist(&self, records: &[StoreRecord]) -> Result<()> {
        #[derive(Serialize)]
        struct PersistedRef<'a> {
            version: u32,
            embedder_id: &'a str,
            records: &'a [StoreRecord],
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let data = serde_json::to_string(&PersistedRef {
            version: STORE_VERSION,
            embedder_id: &self.embedder_id,
            records,
        })?;
        tokio::fs::write(&self.path, data)
            .await
            .with_context(|| format!("Failed to write vector store: {}", self.path.display()))?;
        debug!(records = records.len(), "Saved vector store to disk");
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    fn embedder_id(&self) -> &str {
        &self.embedder_id
    }

    async fn add(&self, records: Vec<StoreRecord>) -> Result<usize> {
        let added = records.len();
        let mut guard = self.records.write().await;
        for record in records {
            match guard.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => guard.push(record),
            }
        }
        self.persist(&guard).await?;
        Ok(added)
    }

    async fn query(
        &self,
        filter: &MetadataPredicate,
        top_k: usize,
        embedding: &[f32],
    ) -> Result<Vec<StoreHit>> {
        let guard = self.records.read().await;
        let mut hits: Vec<StoreHit> = guard
            .iter()
            .filter(|r| filter.matches(&r.metadata))
            .map(|r| StoreHit {
                text: r.text.clone(),
                metadata: r.metadata.clone(),
                score: cosine_similarity(embedding, &r.embedding),
            })
            .collect();

        // 稳定排序：相似度相同时保持写入顺序
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self, filter: Option<&MetadataPredicate>) -> Result<usize> {
        let guard = self.records.read().await;
        Ok(match filter {
            Some(f) => guard.iter().filter(|r| f.matches(&r.metadata)).count(),
            None => guard.len(),
        })
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
