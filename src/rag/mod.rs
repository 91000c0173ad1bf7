//! 检索层：向量化、向量库、分组计划、分组检索与上下文合并、知识库初始化

pub mod assembler;
pub mod embedding;
pub mod ingest;
pub mod partition;
pub mod retriever;
pub mod splitter;
pub mod store;

pub use assembler::ContextAssembler;
pub use embedding::{Embedder, HashEmbedder, create_embedder};
pub use ingest::{InitSummary, KnowledgeBaseInitializer};
pub use partition::{PartitionPlanner, ProvinceRegistry};
pub use retriever::{GroupHits, GroupRetriever};
pub use store::{LocalVectorStore, StoreHit, StoreRecord, VectorStore};
