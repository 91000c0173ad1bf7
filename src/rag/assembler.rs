use tracing::debug;

use super::retriever::GroupHits;
use crate::types::{AssembledContexts, ContextGroup, FilterGroup};

/// 合并分组检索结果
///
/// 引用标记依赖分组位置，因此无论完成顺序如何，都先还原为计划顺序再构建引用映射。
/// 计划中缺失结果的分组以空组补齐。
#[derive(Debug, Default, Clone)]
pub struct ContextAssembler;

impl ContextAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn assemble(&self, plan: &[FilterGroup], results: Vec<GroupHits>) -> AssembledContexts {
        let mut slots: Vec<Option<ContextGroup>> = vec![None; plan.len()];
        for hits in results {
            if let Some(slot) = slots.get_mut(hits.plan_index) {
                *slot = Some(hits.group);
            }
        }

        let groups: Vec<ContextGroup> = plan
            .iter()
            .zip(slots)
            .map(|(filter, slot)| {
                slot.unwrap_or_else(|| ContextGroup {
                    name: filter.name,
                    predicate: filter.predicate.clone(),
                    items: Vec::new(),
                })
            })
            .collect();

        let contexts = AssembledContexts::new(groups);
        debug!(
            counts = %contexts
                .groups
                .iter()
                .map(|g| format!("{}={}", g.name, g.items.len()))
                .collect::<Vec<_>>()
                .join(", "),
            references = contexts.references.len(),
            "Contexts assembled"
        );
        contexts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CitationTag, ContextItem, GroupName, KbType, MetadataField, MetadataPredicate};

    fn filter(name: GroupName) -> FilterGroup {
        FilterGroup {
            name,
            predicate: MetadataPredicate::equals(MetadataField::KbType, "core"),
            excluded_province: None,
        }
    }

    fn group(name: GroupName, sources: &[&str]) -> ContextGroup {
        ContextGroup {
            name,
            predicate: MetadataPredicate::equals(MetadataField::KbType, "core"),
            items: sources
                .iter()
                .map(|s| ContextItem {
                    text: format!("{}。", s),
                    kb_type: KbType::Core,
                    province: "中央".to_string(),
                    source_name: s.to_string(),
                    chunk_id: 0,
                    reference_id: Some(format!("{}::0", s)),
                    score: 1.0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_assemble_restores_plan_order() {
        let plan = vec![
            filter(GroupName::Core),
            filter(GroupName::TargetRegion),
            filter(GroupName::OtherRegions),
        ];
        let completed = vec![
            GroupHits {
                plan_index: 2,
                group: group(GroupName::OtherRegions, &["c.txt"]),
            },
            GroupHits {
                plan_index: 0,
                group: group(GroupName::Core, &["a.txt", "b.txt"]),
            },
        ];

        let contexts = ContextAssembler::new().assemble(&plan, completed);

        let names: Vec<GroupName> = contexts.groups.iter().map(|g| g.name).collect();
        assert_eq!(
            names,
            vec![GroupName::Core, GroupName::TargetRegion, GroupName::OtherRegions]
        );
        assert!(contexts.groups[1].is_empty());
        assert_eq!(contexts.references.tag_for("b.txt::0"), Some(CitationTag::new(1, 2)));
        assert_eq!(contexts.references.tag_for("c.txt::0"), Some(CitationTag::new(3, 1)));
    }
}
