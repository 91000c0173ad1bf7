use crate::types::{AssembledContexts, ContextItem, GroupRole, StructuredSummary};
use crate::utils::text::truncate_chars;

/// 摘要提示词构建器
///
/// 提示词只向模型声明约束（JSON形状、合法引用、分组省份），约束的执行在解码阶段完成。
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    max_chars: usize,
}

impl PromptBuilder {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn build(
        &self,
        question: &str,
        province: Option<&str>,
        contexts: &AssembledContexts,
    ) -> String {
        let schema = serde_json::to_string_pretty(&schemars::schema_for!(StructuredSummary))
            .unwrap_or_default();
        let province_label = province.unwrap_or("未识别");

        let mut prompt = String::new();
        prompt.push_str("你是政府采购领域的专业助手。请只基于下方检索到的切片，用中文回答用户问题。\n");
        prompt.push_str("输出要求：\n");
        prompt.push_str("1) 只输出一个JSON对象，不要输出任何解释、Markdown或代码块标记。\n");
        prompt.push_str("2) JSON包含键 summary、core、target、others：summary 为1-2段总结；");
        prompt.push_str("core/target/others 为数组，每项为 {\"text\": 要点, \"ref\": 出处}。\n");
        prompt.push_str("3) ref 必须是下方“可用出处”中列出的 source_name::chunk_id 之一，不得编造。\n");
        prompt.push_str(&format!(
            "4) target 中要点的出处省份必须是“{}”；others 中要点的出处省份必须不同于“{}”。\n",
            province_label, province_label
        ));
        prompt.push_str("5) 某组没有相关信息时给出空数组。禁止输出上下文中未出现的数据或政策名称。\n\n");
        prompt.push_str("JSON Schema：\n");
        prompt.push_str(&schema);
        prompt.push_str("\n\n");

        prompt.push_str(&format!("用户问题：{}\n", question.trim()));
        prompt.push_str(&format!("识别省份：{}\n\n", province_label));

        prompt.push_str("可用出处（ref → 引用标记）：\n");
        if contexts.references.is_empty() {
            prompt.push_str("（无）\n");
        }
        for (tag, reference_id) in contexts.references.entries() {
            prompt.push_str(&format!("- {} → {}\n", reference_id, tag));
        }

        prompt.push_str("\n检索上下文（含分组与编号）：\n");
        for (gi, group) in contexts.groups.iter().enumerate() {
            let role: GroupRole = group.name.role();
            prompt.push_str(&format!(
                "=== 组{}: {} ({}) ===\n",
                gi + 1,
                role.label(),
                role.json_key()
            ));
            if group.items.is_empty() {
                prompt.push_str("（该组未检索到相关内容）\n");
            }
            for (i, item) in group.items.iter().enumerate() {
                prompt.push_str(&self.format_item(i + 1, item));
                prompt.push('\n');
            }
        }

        prompt
    }

    fn format_item(&self, index: usize, item: &ContextItem) -> String {
        format!(
            "[{}] ({}/{}) {} ref={}\n{}",
            index,
            item.kb_type,
            item.province,
            item.source_name,
            item.reference_id.as_deref().unwrap_or("-"),
            truncate_chars(item.text.trim(), self.max_chars)
        )
    }
}
