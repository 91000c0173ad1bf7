use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::context::GroupRole;

/// 摘要中的一条要点
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SummaryBullet {
    /// 要点内容
    pub text: String,
    /// 出处切片标识，形如 `source_name::chunk_id`
    #[serde(rename = "ref", default)]
    pub reference_id: Option<String>,
}

/// 模型需要返回的结构化摘要
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct StructuredSummary {
    /// 1-2段总结
    #[serde(default)]
    pub summary: String,
    /// 核心组要点
    #[serde(default)]
    pub core: Vec<SummaryBullet>,
    /// 目标地域组要点
    #[serde(default)]
    pub target: Vec<SummaryBullet>,
    /// 其他组要点
    #[serde(default)]
    pub others: Vec<SummaryBullet>,
}

impl StructuredSummary {
    pub fn bullets(&self, role: GroupRole) -> &[SummaryBullet] {
        match role {
            GroupRole::Core => &self.core,
            GroupRole::Target => &self.target,
            GroupRole::Others => &self.others,
        }
    }
}
