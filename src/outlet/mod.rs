//! 结果文档输出

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::pipeline::render::NO_CONTENT_MARKER;
use crate::types::{AssembledContexts, CitationTag, GroupRole};

/// 某一分组的引用列表，条目形如 `[g-i] source_name::chunk_id`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceGroup {
    pub role: GroupRole,
    pub items: Vec<String>,
}

impl ReferenceGroup {
    /// 按 核心组/目标地域组/其他组 顺序列出引用；计划中不存在的分组给出空列表
    pub fn from_contexts(contexts: &AssembledContexts) -> Vec<ReferenceGroup> {
        GroupRole::ALL
            .iter()
            .map(|&role| {
                let items = contexts
                    .group_for(role)
                    .map(|(gi, group)| {
                        group
                            .items
                            .iter()
                            .enumerate()
                            .filter_map(|(i, item)| {
                                let tag = CitationTag::new(gi, i + 1);
                                match &item.reference_id {
                                    // 重复切片只在首次出现的位置列出
                                    Some(reference_id) => {
                                        let first = contexts.references.tag_for(reference_id)
                                            == Some(tag);
                                        first.then(|| format!("{} {}", tag, reference_id))
                                    }
                                    None => Some(format!("{} {}", tag, item.source_name)),
                                }
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                ReferenceGroup { role, items }
            })
            .collect()
    }
}

/// 最终Markdown文档
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkdownDoc {
    pub question: String,
    pub answer_markdown: String,
    pub references: Vec<ReferenceGroup>,
}

impl MarkdownDoc {
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# 问题\n\n{}\n\n", self.question.trim()));
        out.push_str(&format!("# 回答\n\n{}\n\n", self.answer_markdown.trim()));
        out.push_str("# 引用处\n\n");
        for group in &self.references {
            out.push_str(&format!("## {}\n\n", group.role.label()));
            if group.items.is_empty() {
                out.push_str(&format!("- {}\n", NO_CONTENT_MARKER));
            }
            for item in &group.items {
                out.push_str(&format!("- {}\n", item));
            }
            out.push('\n');
        }
        format!("{}\n", out.trim_end())
    }
}

pub trait Outlet {
    async fn save(&self, doc: &MarkdownDoc) -> Result<PathBuf>;
}

/// 写入本地文件
pub struct DiskOutlet {
    output_path: PathBuf,
}

impl DiskOutlet {
    pub fn new(output_path: &Path) -> Self {
        Self {
            output_path: output_path.to_path_buf(),
        }
    }
}

impl Outlet for DiskOutlet {
    async fn save(&self, doc: &MarkdownDoc) -> Result<PathBuf> {
        if let Some(parent_dir) = self.output_path.parent()
            && !parent_dir.as_os_str().is_empty()
            && !parent_dir.exists()
        {
            fs::create_dir_all(parent_dir).with_context(|| {
                format!("Failed to create output directory: {}", parent_dir.display())
            })?;
        }

        fs::write(&self.output_path, doc.render()).with_context(|| {
            format!("Failed to write markdown: {}", self.output_path.display())
        })?;

        Ok(self.output_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContextGroup, ContextItem, GroupName, KbType, MetadataField, MetadataPredicate};
    use tempfile::TempDir;

    fn item(source: &str, chunk_id: u32) -> ContextItem {
        ContextItem {
            text: "内容。".to_string(),
            kb_type: KbType::Core,
            province: "中央".to_string(),
            source_name: source.to_string(),
            chunk_id,
            reference_id: Some(format!("{}::{}", source, chunk_id)),
            score: 0.5,
        }
    }

    fn contexts() -> AssembledContexts {
        AssembledContexts::new(vec![
            ContextGroup {
                name: GroupName::Core,
                predicate: MetadataPredicate::equals(MetadataField::KbType, "core"),
                items: vec![item("a.txt", 0), item("a.txt", 1)],
            },
            ContextGroup {
                name: GroupName::Others,
                predicate: MetadataPredicate::equals(MetadataField::KbType, "regional"),
                items: vec![item("a.txt", 0), item("b.txt", 4)],
            },
        ])
    }

    #[test]
    fn test_reference_groups() {
        let groups = ReferenceGroup::from_contexts(&contexts());

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].items, vec!["[1-1] a.txt::0", "[1-2] a.txt::1"]);
        assert!(groups[1].items.is_empty());
        assert_eq!(groups[2].role, GroupRole::Others);
        assert_eq!(groups[2].items, vec!["[2-2] b.txt::4"]);
    }

    #[test]
    fn test_markdown_doc_render() {
        let doc = MarkdownDoc {
            question: "四川如何稳外资？".to_string(),
            answer_markdown: "## 核心组\n- 要点 [1-1]\n".to_string(),
            references: ReferenceGroup::from_contexts(&contexts()),
        };

        assert_eq!(
            doc.render(),
            "# 问题\n\n四川如何稳外资？\n\n# 回答\n\n## 核心组\n- 要点 [1-1]\n\n# 引用处\n\n## 核心组\n\n- [1-1] a.txt::0\n- [1-2] a.txt::1\n\n## 目标地域组\n\n- 该组未检索到相关内容\n\n## 其他组\n\n- [2-2] b.txt::4\n"
        );
    }

    #[tokio::test]
    async fn test_disk_outlet_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output").join("result.md");
        let doc = MarkdownDoc {
            question: "问题".to_string(),
            answer_markdown: "回答".to_string(),
            references: vec![],
        };

        let written = DiskOutlet::new(&path).save(&doc).await.unwrap();

        assert_eq!(written, path);
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("# 问题"));
    }
}
