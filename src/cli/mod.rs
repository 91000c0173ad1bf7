use crate::config::{Config, EmbeddingProvider, LLMProvider};
use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::PathBuf;

/// multi-search - 分区检索与分组摘要
#[derive(Parser, Debug)]
#[command(name = "multi-search")]
#[command(
    about = "Partitioned retrieval over a core/regional policy knowledge base, summarized per group with citations and written to Markdown."
)]
#[command(version)]
pub struct Args {
    /// 问题：将查询并保存到Markdown
    #[arg(long = "q")]
    pub question: Option<String>,

    /// 输出Markdown路径
    #[arg(long = "out")]
    pub output_path: Option<PathBuf>,

    /// 每组Top-k
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// 覆盖从问题中识别的省份
    #[arg(long)]
    pub province: Option<String>,

    /// 执行数据初始化并退出
    #[arg(long)]
    pub init: bool,

    /// 数据目录路径
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// 向量库持久化目录
    #[arg(long)]
    pub persist_dir: Option<PathBuf>,

    /// 初始化前重置向量库
    #[arg(long)]
    pub reset: bool,

    /// 在日志中输出详细信息
    #[arg(short, long)]
    pub verbose: bool,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// LLM Provider (openai, moonshot, deepseek, anthropic, gemini, ollama)
    #[arg(long)]
    pub llm_provider: Option<String>,

    /// 摘要模型
    #[arg(long)]
    pub model: Option<String>,

    /// LLM API KEY
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// LLM API基地址
    #[arg(long)]
    pub llm_api_base_url: Option<String>,

    /// Embedding Provider (hash, ollama, openai)
    #[arg(long)]
    pub embedder: Option<String>,
}

impl Args {
    /// 将CLI参数转换为配置，CLI参数覆盖配置文件中的值
    pub fn into_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(output_path) = &self.output_path {
            config.output_path = output_path.clone();
        }
        if let Some(top_k) = self.top_k {
            config.retrieval.top_k = top_k;
        }
        if let Some(data_dir) = &self.data_dir {
            config.knowledge_base.data_dir = data_dir.clone();
        }
        if let Some(persist_dir) = &self.persist_dir {
            config.knowledge_base.persist_dir = persist_dir.clone();
        }

        // 覆盖LLM配置
        if let Some(provider_str) = &self.llm_provider {
            config.llm.provider = provider_str
                .parse::<LLMProvider>()
                .map_err(|e| anyhow!(e))?;
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(llm_api_key) = &self.llm_api_key {
            config.llm.api_key = llm_api_key.clone();
        }
        if let Some(llm_api_base_url) = &self.llm_api_base_url {
            config.llm.api_base_url = llm_api_base_url.clone();
        }

        if let Some(embedder_str) = &self.embedder {
            config.embedding.provider = embedder_str
                .parse::<EmbeddingProvider>()
                .map_err(|e| anyhow!(e))?;
        }

        config.verbose = config.verbose || self.verbose;

        Ok(config)
    }
}
