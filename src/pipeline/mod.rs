//! 查询链路：识别地域 → 构建分组 → 分组检索 → 摘要 → 引用

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::config::{Config, RetrievalConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::llm::{LLMClient, TextGenerator};
use crate::outlet::{MarkdownDoc, ReferenceGroup};
use crate::rag::{
    ContextAssembler, Embedder, GroupRetriever, LocalVectorStore, PartitionPlanner,
    ProvinceRegistry, VectorStore, create_embedder,
};
use crate::region::{PatternRegionResolver, RegionResolver};
use crate::types::{AssembledContexts, ContextGroup, ReferenceIndex};
use crate::utils::retry::RetryPolicy;

pub mod decoder;
pub mod prompt;
pub mod render;
pub mod timing;

pub use decoder::{DecodeState, DecodedSummary, SummaryDecoder};
pub use prompt::PromptBuilder;
use timing::{StageKeys, TimingScope};
pub use timing::QueryTimings;

/// 一次查询的输入
#[derive(Debug, Clone)]
pub struct QueryInput {
    pub question: String,
    pub top_k: usize,
    /// 显式指定的省份，优先于从问题中识别
    pub province_override: Option<String>,
}

/// 一次查询的结果
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub question: String,
    pub province: Option<String>,
    pub groups: Vec<ContextGroup>,
    pub reference_index: ReferenceIndex,
    pub references: Vec<ReferenceGroup>,
    pub answer_markdown: String,
    pub decode_state: DecodeState,
    pub timings: QueryTimings,
}

impl QueryOutcome {
    pub fn to_document(&self) -> MarkdownDoc {
        MarkdownDoc {
            question: self.question.clone(),
            answer_markdown: self.answer_markdown.clone(),
            references: self.references.clone(),
        }
    }
}

/// 把可能失败的取消信号转换为 `run_until_cancelled` 可用的信号：
/// 监听建立失败时永不完成，查询照常执行
pub async fn cancel_signal<F, E>(signal: F)
where
    F: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    if let Err(e) = signal.await {
        warn!(error = %e, "Cancellation signal unavailable, query cannot be interrupted");
        std::future::pending::<()>().await;
    }
}

pub struct QueryPipeline {
    resolver: Arc<dyn RegionResolver>,
    planner: PartitionPlanner,
    registered_provinces: BTreeSet<String>,
    embedder: Arc<dyn Embedder>,
    embed_retry: RetryPolicy,
    retriever: GroupRetriever,
    assembler: ContextAssembler,
    prompt_builder: PromptBuilder,
    generator: Arc<dyn TextGenerator>,
}

impl QueryPipeline {
    pub fn new(
        resolver: Arc<dyn RegionResolver>,
        registered_provinces: BTreeSet<String>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn TextGenerator>,
        retrieval: &RetrievalConfig,
    ) -> Self {
        let retry = RetryPolicy::new(
            retrieval.retry_attempts,
            retrieval.retry_delay_ms,
            retrieval.timeout_seconds,
        );
        Self {
            resolver,
            planner: PartitionPlanner::new(),
            registered_provinces,
            embedder,
            embed_retry: retry.clone(),
            retriever: GroupRetriever::new(store, retry),
            assembler: ContextAssembler::new(),
            prompt_builder: PromptBuilder::new(retrieval.context_max_chars),
            generator,
        }
    }

    /// 按配置装配：打开向量库、读取地域登记表、创建模型客户端。
    /// 知识库缺失或向量化 Provider 不一致时在此处直接报错。
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let store =
            LocalVectorStore::open(&config.knowledge_base.store_path(), &embedder.id()).await?;
        let resolver: Arc<dyn RegionResolver> = Arc::new(PatternRegionResolver::new());
        let registered = ProvinceRegistry::registered_provinces(
            &config.knowledge_base.registry_path(),
            resolver.as_ref(),
        );
        let generator = Arc::new(LLMClient::new(&config.llm)?);

        Ok(Self::new(
            resolver,
            registered,
            embedder,
            Arc::new(store),
            generator,
            &config.retrieval,
        ))
    }

    /// 执行一次查询
    pub async fn run(&self, input: QueryInput) -> PipelineResult<QueryOutcome> {
        let query_id = Uuid::new_v4();
        let span = info_span!("query", %query_id, province = tracing::field::Empty);
        self.run_stages(input).instrument(span).await
    }

    /// 执行查询，`signal` 先完成时放弃进行中的检索与模型调用
    pub async fn run_until_cancelled<S>(
        &self,
        input: QueryInput,
        signal: S,
    ) -> PipelineResult<QueryOutcome>
    where
        S: Future<Output = ()>,
    {
        tokio::select! {
            outcome = self.run(input) => outcome,
            _ = signal => {
                warn!("Query cancelled, discarding partial results");
                Err(PipelineError::Cancelled)
            }
        }
    }

    async fn run_stages(&self, input: QueryInput) -> PipelineResult<QueryOutcome> {
        let mut timing = TimingScope::new();
        let question = input.question.trim().to_string();
        info!(question = %question, top_k = input.top_k, "Query started");

        timing.start_phase(StageKeys::ENRICH_INPUT);
        let province = info_span!("EnrichInput").in_scope(|| {
            let province = input
                .province_override
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .or_else(|| self.resolver.resolve(&question));
            info!(province = province.as_deref().unwrap_or("-"), "EnrichInput");
            province
        });
        tracing::Span::current().record("province", province.as_deref().unwrap_or("-"));

        timing.start_phase(StageKeys::BUILD_FILTERS);
        let plan = info_span!("BuildFilters").in_scope(|| {
            let plan = self
                .planner
                .plan(province.as_deref(), &self.registered_provinces);
            let names: Vec<&str> = plan.iter().map(|g| g.name.as_str()).collect();
            info!(groups = %names.join(", "), "BuildFilters");
            plan
        });

        timing.start_phase(StageKeys::RUN_MULTI_QUERY);
        let contexts: AssembledContexts = async {
            info!(top_k = input.top_k, groups = plan.len(), "RunMultiQuery start");
            let embedding = self
                .embed_retry
                .run("embed_query", || self.embedder.embed_query(&question))
                .await
                .map_err(|e| PipelineError::Embedding(e.to_string()))?;
            let hits = self.retriever.retrieve(&plan, &embedding, input.top_k).await;
            Ok::<_, PipelineError>(self.assembler.assemble(&plan, hits))
        }
        .instrument(info_span!("RunMultiQuery"))
        .await?;

        timing.start_phase(StageKeys::SUMMARIZE);
        let decoded = async {
            let prompt = self
                .prompt_builder
                .build(&question, province.as_deref(), &contexts);
            info!(prompt_len = prompt.chars().count(), "Summarize start");
            let raw = self.generator.generate(&prompt).await?;
            info!(raw_len = raw.chars().count(), "LLM raw response");
            let decoded = SummaryDecoder::new(&contexts, province.as_deref()).decode(&raw)?;
            info!(state = %decoded.state, md_len = decoded.markdown.chars().count(), "Summarize end");
            Ok::<_, PipelineError>(decoded)
        }
        .instrument(info_span!("Summarize"))
        .await?;

        timing.start_phase(StageKeys::REFERENCES);
        let references = info_span!("References").in_scope(|| {
            let references = ReferenceGroup::from_contexts(&contexts);
            let counts: Vec<String> = references
                .iter()
                .map(|r| format!("{}={}", r.role.json_key(), r.items.len()))
                .collect();
            info!(counts = %counts.join(", "), "References built");
            references
        });

        let timings = timing.finish();
        info!(timings = %timings.report(), "Query finished");

        Ok(QueryOutcome {
            question,
            province,
            groups: contexts.groups,
            reference_index: contexts.references,
            references,
            answer_markdown: decoded.markdown,
            decode_state: decoded.state,
            timings,
        })
    }
}
