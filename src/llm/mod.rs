//! LLM客户端 - 提供统一的文本生成接口

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::config::LLMConfig;
use crate::error::{PipelineError, PipelineResult};

mod providers;

use providers::{ProviderAgent, ProviderClient};

/// 摘要模型的系统提示词
const SYSTEM_PROMPT: &str = "你是政府采购领域的专业助手，只依据用户提供的检索切片作答，只输出JSON。";

/// 文本生成能力
///
/// 实现不应自动重试：一次调用失败或超时即视为该次查询失败。
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> PipelineResult<String>;
}

/// 基于rig的LLM客户端
pub struct LLMClient {
    agent: ProviderAgent,
    timeout: Duration,
    model: String,
}

impl LLMClient {
    /// 创建新的LLM客户端
    pub fn new(config: &LLMConfig) -> anyhow::Result<Self> {
        let client = ProviderClient::new(config)?;
        let agent = client.create_agent(SYSTEM_PROMPT, config)?;
        Ok(Self {
            agent,
            timeout: Duration::from_secs(config.timeout_seconds),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for LLMClient {
    async fn generate(&self, prompt: &str) -> PipelineResult<String> {
        debug!(model = %self.model, prompt_len = prompt.chars().count(), "Calling LLM");

        match tokio::time::timeout(self.timeout, self.agent.prompt(prompt)).await {
            Ok(Ok(text)) => {
                debug!(model = %self.model, response_len = text.chars().count(), "LLM responded");
                Ok(text)
            }
            Ok(Err(e)) => Err(PipelineError::Generation(format!("{:#}", e))),
            Err(_) => Err(PipelineError::GenerationTimeout(self.timeout.as_secs())),
        }
    }
}
