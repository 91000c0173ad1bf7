//! 分组检索
//!
//! 每个分组独立发起一次相似度查询，分组之间互不依赖，并发执行。
//! 结果按完成顺序返回，由 [`ContextAssembler`](super::assembler::ContextAssembler) 还原为计划顺序。

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::sync::Arc;
use tracing::{debug, warn};

use super::store::VectorStore;
use crate::types::{ContextGroup, ContextItem, FilterGroup};
use crate::utils::retry::RetryPolicy;

/// 单个分组的检索结果，附带其在计划中的位置（从0开始）
#[derive(Debug, Clone, PartialEq)]
pub struct GroupHits {
    pub plan_index: usize,
    pub group: ContextGroup,
}

pub struct GroupRetriever {
    store: Arc<dyn VectorStore>,
    retry: RetryPolicy,
}

impl GroupRetriever {
    pub fn new(store: Arc<dyn VectorStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// 并发检索全部分组；单组重试耗尽后视为空组，不影响其他分组
    pub async fn retrieve(
        &self,
        groups: &[FilterGroup],
        embedding: &[f32],
        top_k: usize,
    ) -> Vec<GroupHits> {
        let mut pending: FuturesUnordered<_> = groups
            .iter()
            .enumerate()
            .map(|(plan_index, group)| async move {
                GroupHits {
                    plan_index,
                    group: self.retrieve_group(group, embedding, top_k).await,
                }
            })
            .collect();

        let mut finished = Vec::with_capacity(groups.len());
        while let Some(hits) = pending.next().await {
            finished.push(hits);
        }
        finished
    }

    async fn retrieve_group(
        &self,
        group: &FilterGroup,
        embedding: &[f32],
        top_k: usize,
    ) -> ContextGroup {
        let operation = format!("retrieve[{}]", group.name);
        debug!(group = %group.name, filter = %group.predicate, top_k, "Retrieving group");

        let hits = self
            .retry
            .run(&operation, || {
                self.store.query(&group.predicate, top_k, embedding)
            })
            .await;

        let items = match hits {
            Ok(hits) => hits
                .into_iter()
                .filter(|hit| match &group.excluded_province {
                    Some(excluded) => &hit.metadata.province != excluded,
                    None => true,
                })
                .map(|hit| ContextItem::from_metadata(hit.text, &hit.metadata, hit.score))
                .collect(),
            Err(e) => {
                warn!(group = %group.name, error = %e, "Group retrieval exhausted retries, treating as empty");
                Vec::new()
            }
        };

        debug!(group = %group.name, count = items.len(), "Group retrieved");

        ContextGroup {
            name: group.name,
            predicate: group.predicate.clone(),
            items,
        }
    }
}
