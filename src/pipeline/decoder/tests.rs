use super::*;
use crate::pipeline::render::CITATION_PATTERN;
use crate::types::{CitationTag, ContextGroup, ContextItem, GroupName, KbType, MetadataField, MetadataPredicate};

const CORE_A: &str = "【中央】采购通知.txt";
const TARGET_A: &str = "【四川】稳外资方案.txt";

fn item(source: &str, chunk_id: u32, kb_type: KbType, province: &str, text: &str) -> ContextItem {
    ContextItem {
        text: text.to_string(),
        kb_type,
        province: province.to_string(),
        source_name: source.to_string(),
        chunk_id,
        reference_id: Some(format!("{}::{}", source, chunk_id)),
        score: 0.7,
    }
}

fn group(name: GroupName, items: Vec<ContextItem>) -> ContextGroup {
    ContextGroup {
        name,
        predicate: MetadataPredicate::equals(MetadataField::KbType, "regional"),
        items,
    }
}

/// 核心组2条、目标地域组1条、其余地域组0条
fn sichuan_contexts() -> AssembledContexts {
    AssembledContexts::new(vec![
        group(
            GroupName::Core,
            vec![
                item(CORE_A, 0, KbType::Core, "中央", "中央推动采购意向公开。提高透明度。"),
                item(CORE_A, 1, KbType::Core, "中央", "完善评审专家管理。"),
            ],
        ),
        group(
            GroupName::TargetRegion,
            vec![item(TARGET_A, 0, KbType::Regional, "四川", "四川出台稳外资行动方案。")],
        ),
        group(GroupName::OtherRegions, vec![]),
    ])
}

fn assert_no_dangling_tags(markdown: &str, contexts: &AssembledContexts) {
    for caps in CITATION_PATTERN.captures_iter(markdown) {
        let tag = CitationTag::new(caps[1].parse().unwrap(), caps[2].parse().unwrap());
        assert!(
            contexts.references.reference_for(&tag).is_some(),
            "dangling tag {} in:\n{}",
            tag,
            markdown
        );
    }
}

fn section<'m>(markdown: &'m str, header: &str) -> Vec<&'m str> {
    markdown
        .lines()
        .skip_while(|line| line.trim() != header)
        .skip(1)
        .take_while(|line| !line.trim_start().starts_with('#'))
        .filter(|line| !line.trim().is_empty())
        .collect()
}

#[test]
fn test_empty_response_is_fatal() {
    let contexts = sichuan_contexts();
    let decoder = SummaryDecoder::new(&contexts, Some("四川"));

    assert!(matches!(decoder.decode(""), Err(PipelineError::EmptyResponse)));
    assert!(matches!(decoder.decode("  \n\t "), Err(PipelineError::EmptyResponse)));
}

#[test]
fn test_structured_parse_renders_resolved_bullets() {
    let contexts = sichuan_contexts();
    let raw = format!(
        r#"{{"summary":"总体结论。","core":[{{"text":"推动采购意向公开","ref":"{core}::0"}}],"target":[{{"text":"稳外资","ref":"{target}::0"}}],"others":[]}}"#,
        core = CORE_A,
        target = TARGET_A
    );

    let decoded = SummaryDecoder::new(&contexts, Some("四川")).decode(&raw).unwrap();

    assert_eq!(decoded.state, DecodeState::StructuredParse);
    assert_eq!(
        decoded.markdown,
        "### 总结\n总体结论。\n\n## 核心组\n- 推动采购意向公开 [1-1]\n\n## 目标地域组\n- 稳外资 [2-1]\n\n## 其他组\n该组未检索到相关内容\n"
    );
}

#[test]
fn test_sichuan_scenario_missing_others_array() {
    let contexts = sichuan_contexts();
    let raw = format!(
        r#"{{"summary":"","core":[{{"text":"意向公开","ref":"{}::1"}}],"target":[]}}"#,
        CORE_A
    );

    let decoded = SummaryDecoder::new(&contexts, Some("四川")).decode(&raw).unwrap();

    assert_eq!(decoded.state, DecodeState::StructuredParse);
    assert!(!decoded.markdown.contains("### 总结"));
    assert_eq!(section(&decoded.markdown, "## 核心组"), vec!["- 意向公开 [1-2]"]);
    // 模型未给出目标组要点，退回抽取要点
    assert_eq!(
        section(&decoded.markdown, "## 目标地域组"),
        vec!["- 四川出台稳外资行动方案 [2-1]"]
    );
    assert_eq!(section(&decoded.markdown, "## 其他组"), vec![NO_CONTENT_MARKER]);
}

#[test]
fn test_missing_others_array_uses_extractive_bullets() {
    let contexts = AssembledContexts::new(vec![
        group(GroupName::Core, vec![item(CORE_A, 0, KbType::Core, "中央", "核心内容。")]),
        group(GroupName::TargetRegion, vec![item(TARGET_A, 0, KbType::Regional, "四川", "目标内容。")]),
        group(
            GroupName::OtherRegions,
            vec![item("【辽宁】营商环境.txt", 3, KbType::Regional, "辽宁", "辽宁支持民企参与政府采购。更多")],
        ),
    ]);
    let raw = r#"{"summary":"结论","core":[],"target":[]}"#;

    let decoded = SummaryDecoder::new(&contexts, Some("四川")).decode(raw).unwrap();

    assert_eq!(
        section(&decoded.markdown, "## 其他组"),
        vec!["- 辽宁支持民企参与政府采购 [3-1]"]
    );
}

#[test]
fn test_bullet_referencing_another_group_is_rejected() {
    let contexts = sichuan_contexts();
    // 目标组要点引用了核心组切片，其余地域组要点引用了目标省份切片
    let raw = format!(
        r#"{{"summary":"","core":[],"target":[{{"text":"错配","ref":"{core}::0"}}],"others":[{{"text":"同省","ref":"{target}::0"}}]}}"#,
        core = CORE_A,
        target = TARGET_A
    );

    let decoded = SummaryDecoder::new(&contexts, Some("四川")).decode(&raw).unwrap();

    assert!(!decoded.markdown.contains("错配"));
    assert!(!decoded.markdown.contains("同省"));
    assert_eq!(
        section(&decoded.markdown, "## 目标地域组"),
        vec!["- 四川出台稳外资行动方案 [2-1]"]
    );
    assert_no_dangling_tags(&decoded.markdown, &contexts);
}

#[test]
fn test_loose_json_parse_tolerates_shape_errors() {
    let contexts = sichuan_contexts();
    let raw = format!(
        r#"{{"summary":"宽松","core":[{{"text":"意向公开","ref":"{}::0","confidence":0.9}}, "纯文本要点"],"target":"不是数组","extra":true}}"#,
        CORE_A
    );

    let decoded = SummaryDecoder::new(&contexts, Some("四川")).decode(&raw).unwrap();

    assert_eq!(decoded.state, DecodeState::LooseJsonParse);
    assert_eq!(section(&decoded.markdown, "### 总结"), vec!["宽松"]);
    assert_eq!(section(&decoded.markdown, "## 核心组"), vec!["- 意向公开 [1-1]"]);
    assert_eq!(
        section(&decoded.markdown, "## 目标地域组"),
        vec!["- 四川出台稳外资行动方案 [2-1]"]
    );
}

#[test]
fn test_code_fenced_json_is_parsed() {
    let contexts = sichuan_contexts();
    let raw = format!(
        "```json\n{{\"summary\":\"结论\",\"core\":[{{\"text\":\"要点\",\"ref\":\"{}::0\"}}]}}\n```",
        CORE_A
    );

    let decoded = SummaryDecoder::new(&contexts, None).decode(&raw).unwrap();
    assert_eq!(decoded.state, DecodeState::StructuredParse);
}

#[test]
fn test_injected_fallback_fills_core_section() {
    let contexts = sichuan_contexts();
    let raw = "### 总结\n四川积极推进。\n\n## 核心组\n中央层面有多项要求。\n\n## 目标地域组\n- 出台稳外资方案 [2-1] [5-5]\n\n## 其他组\n- 编造的要点 [3-1]\n";

    let decoded = SummaryDecoder::new(&contexts, Some("四川")).decode(raw).unwrap();

    assert_eq!(decoded.state, DecodeState::InjectedFallback);
    assert_eq!(
        decoded.markdown,
        "### 总结\n四川积极推进。\n\n## 核心组\n中央层面有多项要求。\n- 中央推动采购意向公开 [1-1]\n- 完善评审专家管理 [1-2]\n\n## 目标地域组\n- 出台稳外资方案 [2-1]\n\n## 其他组\n该组未检索到相关内容"
    );
    assert_no_dangling_tags(&decoded.markdown, &contexts);
}

#[test]
fn test_injected_fallback_accepts_header_variants() {
    let contexts = sichuan_contexts();
    let raw = "**核心组：**\n1. 意向公开 [1-1]\n### 目标地域组（四川）\n* 稳外资 [2-1]\n## 其他组\n";

    let decoded = SummaryDecoder::new(&contexts, Some("四川")).decode(raw).unwrap();

    assert_eq!(decoded.state, DecodeState::InjectedFallback);
    assert_eq!(section(&decoded.markdown, "## 核心组"), vec!["1. 意向公开 [1-1]"]);
    assert_eq!(section(&decoded.markdown, "## 目标地域组"), vec!["* 稳外资 [2-1]"]);
    assert_eq!(section(&decoded.markdown, "## 其他组"), vec![NO_CONTENT_MARKER]);
}

#[test]
fn test_missing_sections_fall_back_to_generic_summary() {
    let contexts = sichuan_contexts();
    let raw = "## 核心组\n没有要点";

    let decoded = SummaryDecoder::new(&contexts, Some("四川")).decode(raw).unwrap();

    assert_eq!(decoded.state, DecodeState::GenericSummary);
    assert_eq!(
        decoded.markdown,
        "### 总结\n核心组：中央推动采购意向公开。\n目标地域组（四川）：四川出台稳外资行动方案。\n其他组：无检索要点。\n\n## 核心组\n- 中央推动采购意向公开 [1-1]\n- 完善评审专家管理 [1-2]\n\n## 目标地域组\n- 四川出台稳外资行动方案 [2-1]\n\n## 其他组\n该组未检索到相关内容\n"
    );
}

#[test]
fn test_prose_and_broken_json_use_generic_summary() {
    let contexts = sichuan_contexts();
    let decoder = SummaryDecoder::new(&contexts, None);

    let prose = decoder.decode("抱歉，我无法回答这个问题 [7-1]。").unwrap();
    assert_eq!(prose.state, DecodeState::GenericSummary);
    assert!(prose.markdown.contains("目标地域组（目标省份）"));
    assert!(!prose.markdown.contains("[7-1]"));

    let broken = decoder.decode(r#"{"summary": "未闭合"#).unwrap();
    assert_eq!(broken.state, DecodeState::GenericSummary);
}

#[test]
fn test_two_group_plan_numbers_others_as_second() {
    let contexts = AssembledContexts::new(vec![
        group(GroupName::Core, vec![]),
        group(
            GroupName::Others,
            vec![item("【辽宁】营商环境.txt", 0, KbType::Regional, "辽宁", "辽宁优化营商环境。")],
        ),
    ]);

    let decoded = SummaryDecoder::new(&contexts, None).decode("没有结构").unwrap();

    assert_eq!(section(&decoded.markdown, "## 核心组"), vec![NO_CONTENT_MARKER]);
    assert_eq!(section(&decoded.markdown, "## 目标地域组"), vec![NO_CONTENT_MARKER]);
    assert_eq!(
        section(&decoded.markdown, "## 其他组"),
        vec!["- 辽宁优化营商环境 [2-1]"]
    );
    assert_no_dangling_tags(&decoded.markdown, &contexts);
}

#[test]
fn test_decoding_is_idempotent() {
    let contexts = sichuan_contexts();
    let raw = format!(
        r#"{{"summary":"结论","core":[{{"text":"要点","ref":"{}::1"}}],"target":[],"others":[]}}"#,
        CORE_A
    );
    let decoder = SummaryDecoder::new(&contexts, Some("四川"));

    let first = decoder.decode(&raw).unwrap();
    let second = decoder.decode(&raw).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_empty_groups_always_show_marker() {
    let contexts = sichuan_contexts();
    let decoder = SummaryDecoder::new(&contexts, Some("四川"));
    let responses = [
        r#"{"summary":"","others":[{"text":"虚构","ref":"x.txt::0"}]}"#.to_string(),
        r#"{"others":[{"text":"虚构","ref":"x.txt::0","k":1}]}"#.to_string(),
        "## 核心组\n- a\n## 目标地域组\n- b\n## 其他组\n- 虚构要点".to_string(),
        "完全无结构".to_string(),
    ];

    for raw in responses {
        let decoded = decoder.decode(&raw).unwrap();
        assert_eq!(
            section(&decoded.markdown, "## 其他组"),
            vec![NO_CONTENT_MARKER],
            "state {}",
            decoded.state
        );
        assert_no_dangling_tags(&decoded.markdown, &contexts);
    }
}

#[test]
fn test_summary_text_drops_unresolved_tags() {
    let contexts = sichuan_contexts();
    let raw = r#"{"summary":"结论见 [9-9]","core":[],"target":[],"others":[]}"#;

    let decoded = SummaryDecoder::new(&contexts, Some("四川")).decode(raw).unwrap();

    assert_eq!(decoded.state, DecodeState::StructuredParse);
    assert!(decoded.markdown.starts_with("### 总结\n结论见\n"));
    assert_no_dangling_tags(&decoded.markdown, &contexts);
}

fn header_count(markdown: &str, header: &str) -> usize {
    markdown.lines().filter(|line| line.trim() == header).count()
}

#[test]
fn test_summary_text_cannot_open_group_sections() {
    let contexts = sichuan_contexts();
    let raw = r#"{"summary":"结论\n## 其他组\n- 伪造的其他组要点","core":[],"target":[],"others":[]}"#;

    let decoded = SummaryDecoder::new(&contexts, Some("四川")).decode(raw).unwrap();

    assert_eq!(decoded.state, DecodeState::StructuredParse);
    for role in GroupRole::ALL {
        assert_eq!(header_count(&decoded.markdown, &section_header(role)), 1);
    }
    assert!(!decoded.markdown.contains("- 伪造"));
    assert_eq!(section(&decoded.markdown, "## 其他组"), vec![NO_CONTENT_MARKER]);
}

#[test]
fn test_injected_fallback_keeps_first_section_per_group() {
    let contexts = sichuan_contexts();
    let raw = "## 核心组\n- 意向公开 [1-1]\n## 目标地域组\n- 稳外资 [2-1]\n## 其他组\n该组未检索到相关内容\n## 其他组\n- 伪造要点\n## 核心组\n- 重复要点 [1-2]\n";

    let decoded = SummaryDecoder::new(&contexts, Some("四川")).decode(raw).unwrap();

    assert_eq!(decoded.state, DecodeState::InjectedFallback);
    for role in GroupRole::ALL {
        assert_eq!(header_count(&decoded.markdown, &section_header(role)), 1);
    }
    assert_eq!(section(&decoded.markdown, "## 核心组"), vec!["- 意向公开 [1-1]"]);
    assert_eq!(section(&decoded.markdown, "## 其他组"), vec![NO_CONTENT_MARKER]);
    assert!(!decoded.markdown.contains("重复要点"));
}

#[test]
fn test_single_line_code_fence_is_parsed() {
    let contexts = sichuan_contexts();
    let decoder = SummaryDecoder::new(&contexts, None);

    let fenced = format!(
        "```json{{\"summary\":\"结论\",\"core\":[{{\"text\":\"要点\",\"ref\":\"{}::0\"}}]}}```",
        CORE_A
    );
    let decoded = decoder.decode(&fenced).unwrap();
    assert_eq!(decoded.state, DecodeState::StructuredParse);
    assert_eq!(section(&decoded.markdown, "## 核心组"), vec!["- 要点 [1-1]"]);

    let bare = format!(
        "```{{\"summary\":\"结论\",\"core\":[{{\"text\":\"要点\",\"ref\":\"{}::0\"}}]}}\n```",
        CORE_A
    );
    assert_eq!(decoder.decode(&bare).unwrap().state, DecodeState::StructuredParse);
}
