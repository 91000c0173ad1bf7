//! 知识库初始化：读取数据目录、切片、向量化、写入向量库与地域登记表

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::embedding::Embedder;
use super::partition::ProvinceRegistry;
use super::splitter::TextSplitter;
use super::store::{LocalVectorStore, StoreRecord, VectorStore};
use crate::config::KnowledgeBaseConfig;
use crate::types::{ChunkMetadata, KbType, MetadataField, MetadataPredicate};

pub const COLLECTION_NAME: &str = "knowledge_base";

/// 中央文档的地域标记
pub const CORE_PROVINCE: &str = "中央";

/// 文件名中没有地域标记时使用的省份
pub const UNKNOWN_PROVINCE: &str = "未知";

const EMBED_BATCH_SIZE: usize = 32;

/// 初始化结果汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitSummary {
    pub persist_dir: PathBuf,
    pub collection: String,
    pub total_chunks: usize,
    pub processed_files: Vec<String>,
    pub by_kb_type: BTreeMap<String, usize>,
    pub file_chunk_counts: BTreeMap<String, usize>,
    pub skipped_empty_files: Vec<String>,
}

/// 从文件名解析知识库类型与省份：`【中央】…` 为核心文档，`【X】…` 为X省地方文档
pub fn parse_kb_metadata(file_name: &str) -> (KbType, String) {
    if let Some(rest) = file_name.strip_prefix('【')
        && let Some((tag, _)) = rest.split_once('】')
    {
        if tag == CORE_PROVINCE {
            return (KbType::Core, CORE_PROVINCE.to_string());
        }
        return (KbType::Regional, tag.to_string());
    }
    (KbType::Regional, UNKNOWN_PROVINCE.to_string())
}

struct SourceFile {
    name: String,
    path: PathBuf,
    content: String,
}

pub struct KnowledgeBaseInitializer {
    config: KnowledgeBaseConfig,
    embedder: Arc<dyn Embedder>,
}

impl KnowledgeBaseInitializer {
    pub fn new(config: KnowledgeBaseConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self { config, embedder }
    }

    pub async fn run(&self, reset: bool, verbose: bool) -> Result<InitSummary> {
        let store_path = self.config.store_path();
        let registry_path = self.config.registry_path();
        let embedder_id = self.embedder.id();

        info!(
            data_dir = %self.config.data_dir.display(),
            persist_dir = %self.config.persist_dir.display(),
            embedder = %embedder_id,
            reset,
            "Initializing knowledge base"
        );

        let store = LocalVectorStore::create(&store_path, &embedder_id, reset).await?;
        let files = read_source_files(&self.config.data_dir)?;
        let splitter = TextSplitter::new(self.config.chunk_size, self.config.chunk_overlap);

        let mut records = Vec::new();
        let mut file_chunk_counts = BTreeMap::new();
        let mut skipped_empty_files = Vec::new();
        let mut provinces = BTreeSet::new();
        let mut kb_types = BTreeSet::new();

        for file in &files {
            if file.content.trim().is_empty() {
                skipped_empty_files.push(file.name.clone());
                continue;
            }

            let (kb_type, province) = parse_kb_metadata(&file.name);
            let chunks = splitter.split(&file.content);
            debug!(file = %file.name, %kb_type, %province, chunks = chunks.len(), "File split");

            if verbose {
                println!(
                    "   📄 Inserted: {} [kb_type={}, province={}] chunks={}",
                    file.name,
                    kb_type,
                    province,
                    chunks.len()
                );
            }

            kb_types.insert(kb_type.as_str().to_string());
            if kb_type == KbType::Regional {
                provinces.insert(province.clone());
            }
            file_chunk_counts.insert(file.name.clone(), chunks.len());

            for (chunk_id, text) in chunks.into_iter().enumerate() {
                let metadata = ChunkMetadata {
                    kb_type,
                    province: province.clone(),
                    source_name: file.name.clone(),
                    chunk_id: chunk_id as u32,
                    source_path: Some(file.path.display().to_string()),
                };
                records.push(StoreRecord {
                    id: metadata.reference_id(),
                    text,
                    metadata,
                    embedding: Vec::new(),
                });
            }
        }

        if verbose {
            for name in &skipped_empty_files {
                println!("   ⚠️ Skipped empty: {}", name);
            }
        }

        for batch in records.chunks_mut(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
            let vectors = self
                .embedder
                .embed(&texts)
                .await
                .context("Failed to embed chunks")?;
            if vectors.len() != batch.len() {
                anyhow::bail!(
                    "Embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                );
            }
            for (record, vector) in batch.iter_mut().zip(vectors) {
                record.embedding = vector;
            }
        }

        let added = records.len();
        if !records.is_empty() {
            store.add(records).await?;
        }

        let total_chunks = store.count(None).await?;
        let mut by_kb_type = BTreeMap::new();
        for kb_type in [KbType::Core, KbType::Regional] {
            let filter = MetadataPredicate::equals(MetadataField::KbType, kb_type.as_str());
            by_kb_type.insert(kb_type.as_str().to_string(), store.count(Some(&filter)).await?);
        }

        // 增量写入时保留此前登记的省份
        if !reset && let Ok(previous) = ProvinceRegistry::load(&registry_path) {
            provinces.extend(previous.provinces);
            kb_types.extend(previous.kb_types);
        }
        ProvinceRegistry {
            provinces: provinces.into_iter().collect(),
            kb_types: kb_types.into_iter().collect(),
            total_chunks,
        }
        .save(&registry_path)?;

        if verbose {
            println!(
                "   📦 Total chunks added: {} | collection count: {}",
                added, total_chunks
            );
        }

        info!(added, total_chunks, "Knowledge base initialized");

        Ok(InitSummary {
            persist_dir: self.config.persist_dir.clone(),
            collection: COLLECTION_NAME.to_string(),
            total_chunks,
            processed_files: file_chunk_counts.keys().cloned().collect(),
            by_kb_type,
            file_chunk_counts,
            skipped_empty_files,
        })
    }
}

/// 读取数据目录下的文件（不递归），按文件名排序
fn read_source_files(data_dir: &Path) -> Result<Vec<SourceFile>> {
    if !data_dir.is_dir() {
        anyhow::bail!("Data directory not found: {}", data_dir.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(data_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to list {}", data_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path().to_path_buf();
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read data file: {}", path.display()))?;
        files.push(SourceFile {
            name: entry.file_name().to_string_lossy().to_string(),
            path,
            content,
        });
    }
    Ok(files)
}
