use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "multi_search.toml";

/// 默认的OpenAI兼容接口地址（DashScope兼容模式）
pub const DEFAULT_API_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum LLMProvider {
    /// OpenAI兼容接口（含DashScope兼容模式）
    #[serde(rename = "openai")]
    #[default]
    OpenAI,
    #[serde(rename = "moonshot")]
    Moonshot,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Moonshot => write!(f, "moonshot"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Gemini => write!(f, "gemini"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "dashscope" => Ok(LLMProvider::OpenAI),
            "moonshot" => Ok(LLMProvider::Moonshot),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "gemini" => Ok(LLMProvider::Gemini),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// Embedding Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum EmbeddingProvider {
    /// 基于哈希的确定性向量，离线与测试使用
    #[serde(rename = "hash")]
    #[default]
    Hash,
    #[serde(rename = "ollama")]
    Ollama,
    /// OpenAI兼容的 `/embeddings` 接口
    #[serde(rename = "openai")]
    OpenAI,
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProvider::Hash => write!(f, "hash"),
            EmbeddingProvider::Ollama => write!(f, "ollama"),
            EmbeddingProvider::OpenAI => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hash" => Ok(EmbeddingProvider::Hash),
            "ollama" => Ok(EmbeddingProvider::Ollama),
            "openai" | "dashscope" => Ok(EmbeddingProvider::OpenAI),
            _ => Err(format!("Unknown embedding provider: {}", s)),
        }
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Markdown输出路径
    pub output_path: PathBuf,

    /// 日志目录
    pub log_dir: PathBuf,

    /// 是否启用详细日志
    pub verbose: bool,

    /// LLM模型配置
    pub llm: LLMConfig,

    /// 向量化配置
    pub embedding: EmbeddingConfig,

    /// 分组检索配置
    pub retrieval: RetrievalConfig,

    /// 知识库配置
    pub knowledge_base: KnowledgeBaseConfig,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY
    pub api_key: String,

    /// LLM API基地址
    pub api_base_url: String,

    /// 摘要使用的模型
    pub model: String,

    /// 最大tokens
    pub max_tokens: u32,

    /// 温度
    pub temperature: f64,

    /// 超时时间（秒）
    pub timeout_seconds: u64,
}

/// 向量化配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,

    /// 远程向量化模型名称（hash provider 忽略）
    pub model: String,

    pub api_base_url: String,

    pub api_key: String,

    /// 向量维度（仅 hash provider 使用）
    pub dimension: usize,

    /// 超时时间（秒）
    pub timeout_seconds: u64,
}

/// 分组检索配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// 每组Top-k
    pub top_k: usize,

    /// 单组检索的最大尝试次数
    pub retry_attempts: u32,

    /// 重试基础间隔（毫秒），第n次重试等待 n 倍
    pub retry_delay_ms: u64,

    /// 单次检索超时（秒）
    pub timeout_seconds: u64,

    /// 提示词中每个切片保留的最大字符数
    pub context_max_chars: usize,
}

/// 知识库配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct KnowledgeBaseConfig {
    /// 原始数据目录
    pub data_dir: PathBuf,

    /// 向量库持久化目录
    pub persist_dir: PathBuf,

    /// 切片长度（字符）
    pub chunk_size: usize,

    /// 切片重叠（字符）
    pub chunk_overlap: usize,
}

impl KnowledgeBaseConfig {
    /// 向量库文件路径
    pub fn store_path(&self) -> PathBuf {
        self.persist_dir.join("knowledge_base.json")
    }

    /// 地域登记表路径
    pub fn registry_path(&self) -> PathBuf {
        self.persist_dir.join("registry.json")
    }
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 加载配置：显式路径必须可读，否则尝试当前目录下的默认文件，都没有则使用默认值
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        let default_config_path = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(DEFAULT_CONFIG_FILE);
        if default_config_path.exists() {
            Self::from_file(&default_config_path)
        } else {
            Ok(Config::default())
        }
    }
}

/// 依次读取环境变量，返回第一个非空值
fn first_env(keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| std::env::var(k).ok())
        .find(|v| !v.trim().is_empty())
        .unwrap_or_default()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("output/result.md"),
            log_dir: PathBuf::from("output/log"),
            verbose: false,
            llm: LLMConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            knowledge_base: KnowledgeBaseConfig::default(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            api_key: first_env(&[
                "MULTI_SEARCH_LLM_API_KEY",
                "DASHSCOPE_API_KEY",
                "TONGYI_API_KEY",
            ]),
            api_base_url: String::from(DEFAULT_API_BASE_URL),
            model: String::from("qwen-plus"),
            max_tokens: 4096,
            temperature: 0.0,
            timeout_seconds: 120,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: String::from("text-embedding-v4"),
            api_base_url: String::from(DEFAULT_API_BASE_URL),
            api_key: first_env(&[
                "MULTI_SEARCH_EMBEDDING_API_KEY",
                "DASHSCOPE_API_KEY",
                "TONGYI_API_KEY",
            ]),
            dimension: 384,
            timeout_seconds: 30,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            retry_attempts: 3,
            retry_delay_ms: 500,
            timeout_seconds: 30,
            context_max_chars: 600,
        }
    }
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            persist_dir: PathBuf::from(".kb"),
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

// Include tests
#[cfg(test)]
mod tests;
