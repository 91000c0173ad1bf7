use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::predicate::{ChunkMetadata, KbType, MetadataPredicate};

/// 检索计划中的分组名称
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupName {
    /// 核心文档
    Core,
    /// 目标地域文档
    TargetRegion,
    /// 排除目标地域后的其余地域文档
    OtherRegions,
    /// 未识别地域时的全部地域文档
    Others,
}

impl GroupName {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupName::Core => "core",
            GroupName::TargetRegion => "target_region",
            GroupName::OtherRegions => "other_regions",
            GroupName::Others => "others",
        }
    }

    /// 分组在摘要中对应的角色
    pub fn role(&self) -> GroupRole {
        match self {
            GroupName::Core => GroupRole::Core,
            GroupName::TargetRegion => GroupRole::Target,
            GroupName::OtherRegions | GroupName::Others => GroupRole::Others,
        }
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 摘要中的三个固定分组角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    Core,
    Target,
    Others,
}

impl GroupRole {
    /// 按渲染顺序排列的全部角色
    pub const ALL: [GroupRole; 3] = [GroupRole::Core, GroupRole::Target, GroupRole::Others];

    /// 中文小标题
    pub fn label(&self) -> &'static str {
        match self {
            GroupRole::Core => "核心组",
            GroupRole::Target => "目标地域组",
            GroupRole::Others => "其他组",
        }
    }

    /// 模型输出JSON中对应的键
    pub fn json_key(&self) -> &'static str {
        match self {
            GroupRole::Core => "core",
            GroupRole::Target => "target",
            GroupRole::Others => "others",
        }
    }
}

/// 一个检索分组的过滤定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterGroup {
    pub name: GroupName,
    pub predicate: MetadataPredicate,
    /// 查询后需要剔除的省份
    pub excluded_province: Option<String>,
}

/// 检索得到的单个切片
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    pub text: String,
    pub kb_type: KbType,
    pub province: String,
    pub source_name: String,
    pub chunk_id: u32,
    pub reference_id: Option<String>,
    pub score: f32,
}

impl ContextItem {
    pub fn from_metadata(text: String, metadata: &ChunkMetadata, score: f32) -> Self {
        Self {
            text,
            kb_type: metadata.kb_type,
            province: metadata.province.clone(),
            source_name: metadata.source_name.clone(),
            chunk_id: metadata.chunk_id,
            reference_id: Some(metadata.reference_id()),
            score,
        }
    }
}

/// 一个分组的检索结果，条目按相关度降序排列
#[derive(Debug, Clone, PartialEq)]
pub struct ContextGroup {
    pub name: GroupName,
    pub predicate: MetadataPredicate,
    pub items: Vec<ContextItem>,
}

impl ContextGroup {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 引用标记 `[组序号-切片序号]`，两者均从1开始
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CitationTag {
    pub group: usize,
    pub rank: usize,
}

impl CitationTag {
    pub fn new(group: usize, rank: usize) -> Self {
        Self { group, rank }
    }

    /// 解析 `[g-i]` 形式的标记
    pub fn parse(tag: &str) -> Option<Self> {
        let inner = tag.trim().strip_prefix('[')?.strip_suffix(']')?;
        let (group, rank) = inner.split_once('-')?;
        Some(Self {
            group: group.trim().parse().ok()?,
            rank: rank.trim().parse().ok()?,
        })
    }
}

impl fmt::Display for CitationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}-{}]", self.group, self.rank)
    }
}

/// referenceId → 引用标记 的映射
///
/// 每次查询只构建一次，之后只读。提示词构建与最终渲染共用同一份映射，
/// 保证模型看到的合法标记与文档中的标记一致。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceIndex {
    by_reference: HashMap<String, CitationTag>,
    by_tag: HashMap<CitationTag, String>,
}

impl ReferenceIndex {
    pub fn build(groups: &[ContextGroup]) -> Self {
        let mut by_reference = HashMap::new();
        let mut by_tag = HashMap::new();
        for (gi, group) in groups.iter().enumerate() {
            for (i, item) in group.items.iter().enumerate() {
                let Some(reference_id) = &item.reference_id else {
                    continue;
                };
                let tag = CitationTag::new(gi + 1, i + 1);
                // 同一切片出现在多个分组时，保留最先出现的位置
                if by_reference.contains_key(reference_id) {
                    continue;
                }
                by_reference.insert(reference_id.clone(), tag);
                by_tag.insert(tag, reference_id.clone());
            }
        }
        Self {
            by_reference,
            by_tag,
        }
    }

    pub fn tag_for(&self, reference_id: &str) -> Option<CitationTag> {
        self.by_reference.get(reference_id.trim()).copied()
    }

    pub fn reference_for(&self, tag: &CitationTag) -> Option<&str> {
        self.by_tag.get(tag).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    /// 按标记顺序列出全部条目
    pub fn entries(&self) -> Vec<(CitationTag, &str)> {
        let mut entries: Vec<(CitationTag, &str)> = self
            .by_tag
            .iter()
            .map(|(tag, reference_id)| (*tag, reference_id.as_str()))
            .collect();
        entries.sort_by_key(|(tag, _)| *tag);
        entries
    }
}

/// 合并后的检索上下文：按计划顺序排列的分组，以及由此得出的引用映射
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContexts {
    pub groups: Vec<ContextGroup>,
    pub references: ReferenceIndex,
}

impl AssembledContexts {
    pub fn new(groups: Vec<ContextGroup>) -> Self {
        let references = ReferenceIndex::build(&groups);
        Self { groups, references }
    }

    /// 查找某角色对应的分组及其在计划中的序号（从1开始）
    pub fn group_for(&self, role: GroupRole) -> Option<(usize, &ContextGroup)> {
        self.groups
            .iter()
            .enumerate()
            .find(|(_, g)| g.name.role() == role)
            .map(|(i, g)| (i + 1, g))
    }

    pub fn total_items(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }
}
