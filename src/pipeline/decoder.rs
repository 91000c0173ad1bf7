//! 模型输出解码
//!
//! 按固定顺序尝试四种状态，第一个成功的状态产出最终Markdown：
//! 严格结构化解析 → 宽松JSON解析 → 自由文本补注 → 通用总结。
//! 只有空响应会以错误返回。

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;

use super::render::{NO_CONTENT_MARKER, SectionRenderer, section_header};
use crate::error::{PipelineError, PipelineResult};
use crate::types::{AssembledContexts, GroupRole, StructuredSummary, SummaryBullet};

/// 产出最终摘要的解码状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecodeState {
    StructuredParse,
    LooseJsonParse,
    InjectedFallback,
    GenericSummary,
}

impl fmt::Display for DecodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecodeState::StructuredParse => "StructuredParse",
            DecodeState::LooseJsonParse => "LooseJsonParse",
            DecodeState::InjectedFallback => "InjectedFallback",
            DecodeState::GenericSummary => "GenericSummary",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSummary {
    pub state: DecodeState,
    pub markdown: String,
}

/// 分组小标题，允许 `#` 级别、加粗、编号、括注与冒号的差异
static SECTION_HEADER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:#{1,6}\s*)?(?:\*\*)?\s*(?:\d+[.、)]\s*)?(核心组|目标地域组|其他组)\s*(?:[（(][^）)]*[）)])?\s*[:：]?\s*(?:\*\*)?\s*[:：]?\s*$",
    )
    .expect("section header pattern is a valid literal regex")
});

/// 列表项：`- ` `* ` `• ` 或 `1. ` `1、` `1)`
static BULLET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•]\s+|\d+[.、)]\s*)\S").expect("bullet pattern is a valid literal regex")
});

fn header_role(line: &str) -> Option<GroupRole> {
    let caps = SECTION_HEADER_PATTERN.captures(line)?;
    match &caps[1] {
        "核心组" => Some(GroupRole::Core),
        "目标地域组" => Some(GroupRole::Target),
        "其他组" => Some(GroupRole::Others),
        _ => None,
    }
}

fn is_heading(line: &str) -> bool {
    line.trim_start().starts_with('#') || header_role(line).is_some()
}

fn is_bullet(line: &str) -> bool {
    BULLET_PATTERN.is_match(line)
}

/// 去掉包裹整个响应的 ``` 代码块
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return trimmed;
    };

    let lang_len = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(body.len());
    let rest = &body[lang_len..];
    // 语言标记后可以换行，也可以紧跟内容（单行代码块）
    match rest.strip_prefix('\n') {
        Some(inner) => inner.trim(),
        None if lang_len > 0 && rest.trim_start().starts_with(['{', '[']) => rest.trim(),
        None => body.trim(),
    }
}

pub struct SummaryDecoder<'a> {
    renderer: SectionRenderer<'a>,
    province: Option<&'a str>,
}

impl<'a> SummaryDecoder<'a> {
    pub fn new(contexts: &'a AssembledContexts, province: Option<&'a str>) -> Self {
        Self {
            renderer: SectionRenderer::new(contexts),
            province,
        }
    }

    pub fn decode(&self, raw: &str) -> PipelineResult<DecodedSummary> {
        if raw.trim().is_empty() {
            return Err(PipelineError::EmptyResponse);
        }
        let text = strip_code_fence(raw);

        let (state, markdown) = if let Some(markdown) = self.structured_parse(text) {
            (DecodeState::StructuredParse, markdown)
        } else if let Some(markdown) = self.loose_json_parse(text) {
            (DecodeState::LooseJsonParse, markdown)
        } else if let Some(markdown) = self.injected_fallback(text) {
            (DecodeState::InjectedFallback, markdown)
        } else {
            (DecodeState::GenericSummary, self.generic_summary())
        };

        debug!(%state, markdown_len = markdown.chars().count(), "Model output decoded");
        Ok(DecodedSummary { state, markdown })
    }

    /// 状态1：按摘要结构严格解析
    fn structured_parse(&self, text: &str) -> Option<String> {
        let summary: StructuredSummary = serde_json::from_str(text).ok()?;
        Some(self.renderer.render(&summary))
    }

    /// 状态2：形如JSON对象时宽松解析，缺失或类型不符的键视为空
    fn loose_json_parse(&self, text: &str) -> Option<String> {
        if !(text.starts_with('{') && text.ends_with('}')) {
            return None;
        }
        let value: Value = serde_json::from_str(text).ok()?;
        let object = value.as_object()?;

        let bullets = |key: &str| -> Vec<SummaryBullet> {
            object
                .get(key)
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(loose_bullet).collect())
                .unwrap_or_default()
        };

        let summary = StructuredSummary {
            summary: object
                .get("summary")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            core: bullets(GroupRole::Core.json_key()),
            target: bullets(GroupRole::Target.json_key()),
            others: bullets(GroupRole::Others.json_key()),
        };
        Some(self.renderer.render(&summary))
    }

    /// 状态3：当作自由Markdown处理，定位三个小节并为缺少要点的小节补入抽取要点。
    /// 任一小节缺失时返回 None。
    fn injected_fallback(&self, text: &str) -> Option<String> {
        let lines: Vec<String> = text
            .lines()
            .map(|line| self.renderer.strip_dangling_tags(line).trim_end().to_string())
            .collect();

        let mut output = Vec::with_capacity(lines.len());
        let mut located = HashSet::new();
        let mut idx = 0;

        while idx < lines.len() {
            let Some(role) = header_role(&lines[idx]) else {
                output.push(lines[idx].clone());
                idx += 1;
                continue;
            };

            let end = (idx + 1..lines.len())
                .find(|&j| is_heading(&lines[j]))
                .unwrap_or(lines.len());
            if !located.insert(role) {
                // 每个分组只保留首次出现的小节
                debug!(role = role.label(), "Dropping repeated group section");
                idx = end;
                continue;
            }
            let body = &lines[idx + 1..end];
            output.push(section_header(role));

            if !self.renderer.has_content(role) {
                // 空分组只保留提示语
                output.extend(self.renderer.fallback_lines(role));
                output.push(String::new());
            } else {
                let kept: Vec<&String> = body
                    .iter()
                    .filter(|line| line.trim() != NO_CONTENT_MARKER)
                    .collect();
                let content_end = kept
                    .iter()
                    .rposition(|line| !line.trim().is_empty())
                    .map_or(0, |p| p + 1);

                output.extend(kept[..content_end].iter().map(|line| line.to_string()));
                if !kept.iter().any(|line| is_bullet(line)) {
                    output.extend(self.renderer.fallback_lines(role));
                }
                output.extend(kept[content_end..].iter().map(|line| line.to_string()));
            }
            idx = end;
        }

        if GroupRole::ALL.iter().all(|role| located.contains(role)) {
            Some(output.join("\n").trim().to_string())
        } else {
            debug!(located = located.len(), "Free-text response is missing group sections");
            None
        }
    }

    /// 状态4：丢弃模型文本，完全由检索结果构造
    fn generic_summary(&self) -> String {
        self.renderer.render(&StructuredSummary {
            summary: self.renderer.generic_overview(self.province),
            ..Default::default()
        })
    }
}

fn loose_bullet(value: &Value) -> Option<SummaryBullet> {
    match value {
        Value::String(text) => Some(SummaryBullet {
            text: text.clone(),
            reference_id: None,
        }),
        Value::Object(map) => Some(SummaryBullet {
            text: map
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            reference_id: map.get("ref").and_then(Value::as_str).map(str::to_string),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests;
