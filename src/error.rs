use std::path::PathBuf;
use thiserror::Error;

/// 会越过检索-摘要核心边界的错误
///
/// 地域识别失败、单组检索失败、模型输出不合规都在核心内部消化，
/// 只有模型调用失败与配置/知识库失败会以错误形式交给调用方。
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("LLM call failed: {0}")]
    Generation(String),

    #[error("LLM call timed out after {0}s")]
    GenerationTimeout(u64),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Knowledge base not found at {0:?}, run with --init first")]
    KnowledgeBaseMissing(PathBuf),

    #[error("Knowledge base was built with embedder '{found}', but '{expected}' is configured")]
    EmbedderMismatch { expected: String, found: String },

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Query cancelled")]
    Cancelled,
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
