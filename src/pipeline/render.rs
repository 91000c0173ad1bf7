//! 分组摘要渲染
//!
//! 三个分组小节总是按 核心组 → 目标地域组 → 其他组 的顺序全部输出。
//! 模型要点只有在引用能解析、且解析到该小节对应分组时才被采用；
//! 否则退回到从检索切片直接抽取的要点。

use regex::Regex;
use std::sync::LazyLock;

use crate::types::{AssembledContexts, CitationTag, ContextGroup, GroupRole, StructuredSummary, SummaryBullet};
use crate::utils::text::{leading_sentence, single_line};

/// 分组无检索结果时的提示
pub const NO_CONTENT_MARKER: &str = "该组未检索到相关内容";

/// 通用总结中空分组的占位
pub const NO_POINTS_MARKER: &str = "无检索要点";

pub const SUMMARY_HEADER: &str = "### 总结";

/// 文本中的 `[g-i]` 引用标记
pub static CITATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\s*(\d+)\s*-\s*(\d+)\s*\]").expect("citation pattern is a valid literal regex")
});

/// 行首的标题、列表、引用标记
static LINE_MARKUP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\s*(?:#{1,6}\s*|\*\*|[-*•+>]\s+|\d+(?:[.)]\s+|、)))+").expect("line markup pattern is a valid literal regex")
});

pub fn section_header(role: GroupRole) -> String {
    format!("## {}", role.label())
}

/// 从分组切片抽取要点：每个切片取首句，附带其真实引用标记
pub fn extractive_bullets(group: &ContextGroup, group_index: usize) -> Vec<String> {
    group
        .items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            leading_sentence(&item.text)
                .map(|snippet| format!("- {} {}", snippet, CitationTag::new(group_index, i + 1)))
        })
        .collect()
}

/// 绑定到一次查询上下文的小节渲染器
pub struct SectionRenderer<'a> {
    contexts: &'a AssembledContexts,
}

impl<'a> SectionRenderer<'a> {
    pub fn new(contexts: &'a AssembledContexts) -> Self {
        Self { contexts }
    }

    /// 角色对应的非空分组及其计划序号
    fn populated_group(&self, role: GroupRole) -> Option<(usize, &'a ContextGroup)> {
        self.contexts
            .group_for(role)
            .filter(|(_, group)| !group.is_empty())
    }

    /// 该角色在本次计划中是否有检索结果
    pub fn has_content(&self, role: GroupRole) -> bool {
        self.populated_group(role).is_some()
    }

    /// 局部回退内容：抽取要点，分组为空时为提示语
    pub fn fallback_lines(&self, role: GroupRole) -> Vec<String> {
        let bullets = self
            .populated_group(role)
            .map(|(gi, group)| extractive_bullets(group, gi))
            .unwrap_or_default();
        if bullets.is_empty() {
            vec![NO_CONTENT_MARKER.to_string()]
        } else {
            bullets
        }
    }

    /// 将模型要点解析为 `- 文本 [g-i]`；文本为空、引用无法解析或不属于该分组时返回 None
    pub fn resolve_bullet(&self, role: GroupRole, bullet: &SummaryBullet) -> Option<String> {
        let (group_index, _) = self.populated_group(role)?;
        let tag = self
            .contexts
            .references
            .tag_for(bullet.reference_id.as_deref()?)?;
        if tag.group != group_index {
            return None;
        }

        let text = single_line(&CITATION_PATTERN.replace_all(&bullet.text, ""));
        if text.is_empty() {
            return None;
        }
        Some(format!("- {} {}", text, tag))
    }

    /// 删除无法通过引用映射解析的标记
    pub fn strip_dangling_tags(&self, text: &str) -> String {
        CITATION_PATTERN
            .replace_all(text, |caps: &regex::Captures| {
                let resolved = caps[1]
                    .parse::<usize>()
                    .ok()
                    .zip(caps[2].parse::<usize>().ok())
                    .map(|(group, rank)| CitationTag::new(group, rank))
                    .filter(|tag| self.contexts.references.reference_for(tag).is_some());
                match resolved {
                    Some(tag) => tag.to_string(),
                    None => String::new(),
                }
            })
            .into_owned()
    }

    pub fn section_lines(&self, role: GroupRole, bullets: &[SummaryBullet]) -> Vec<String> {
        let mut lines = vec![section_header(role)];
        let resolved: Vec<String> = bullets
            .iter()
            .filter_map(|b| self.resolve_bullet(role, b))
            .collect();
        if resolved.is_empty() {
            lines.extend(self.fallback_lines(role));
        } else {
            lines.extend(resolved);
        }
        lines
    }

    /// 渲染结构化摘要
    pub fn render(&self, summary: &StructuredSummary) -> String {
        let mut parts = Vec::new();
        let overview = self.plain_overview(&summary.summary);
        if !overview.is_empty() {
            parts.push(SUMMARY_HEADER.to_string());
            parts.push(overview);
            parts.push(String::new());
        }

        for role in GroupRole::ALL {
            parts.extend(self.section_lines(role, summary.bullets(role)));
            parts.push(String::new());
        }
        parts.join("\n")
    }

    /// 总结只保留纯文本段落：去掉无法解析的引用、行首标题与列表标记，
    /// 丢弃只剩分组名的行，连续空行合并为一个
    pub fn plain_overview(&self, overview: &str) -> String {
        let mut paragraphs: Vec<String> = Vec::new();
        for line in self.strip_dangling_tags(overview).lines() {
            let text = LINE_MARKUP_PATTERN.replace(line, "");
            let text = text.trim();
            let bare = text.trim_matches(|c: char| c == '*' || c == ':' || c == '：' || c.is_whitespace());
            if GroupRole::ALL.iter().any(|role| bare == role.label()) {
                continue;
            }
            if text.is_empty() && paragraphs.last().is_none_or(|l| l.is_empty()) {
                continue;
            }
            paragraphs.push(text.to_string());
        }
        while paragraphs.last().is_some_and(|l| l.is_empty()) {
            paragraphs.pop();
        }
        paragraphs.join("\n")
    }

    /// 不依赖模型输出的总结：每组一句，取首个切片的首句
    pub fn generic_overview(&self, province: Option<&str>) -> String {
        let snippet = |role: GroupRole| {
            self.populated_group(role)
                .and_then(|(_, group)| group.items.iter().find_map(|item| leading_sentence(&item.text)))
                .unwrap_or_else(|| NO_POINTS_MARKER.to_string())
        };

        [
            format!("{}：{}。", GroupRole::Core.label(), snippet(GroupRole::Core)),
            format!(
                "{}（{}）：{}。",
                GroupRole::Target.label(),
                province.unwrap_or("目标省份"),
                snippet(GroupRole::Target)
            ),
            format!("{}：{}。", GroupRole::Others.label(), snippet(GroupRole::Others)),
        ]
        .join("\n")
    }
}
