//! 知识库动态分组
//!
//! 有省份时分三组：核心、目标地域、其余地域；无省份时分两组：核心、全部地域。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

use crate::region::RegionResolver;
use crate::types::{FilterGroup, GroupName, KbType, MetadataField, MetadataPredicate};

/// 建库时写入的地域登记表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvinceRegistry {
    /// 地方文档涉及的省份，已排序
    pub provinces: Vec<String>,
    pub kb_types: Vec<String>,
    pub total_chunks: usize,
}

impl ProvinceRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read registry: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse registry: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write registry: {}", path.display()))
    }

    /// 读取已登记省份；登记表不可读时退回识别器支持的全部省份
    pub fn registered_provinces(path: &Path, resolver: &dyn RegionResolver) -> BTreeSet<String> {
        match Self::load(path) {
            Ok(registry) => registry.provinces.into_iter().collect(),
            Err(e) => {
                let error = format!("{:#}", e);
                warn!(
                    error = %error,
                    "Province registry unavailable, falling back to resolver provinces"
                );
                resolver.known_provinces()
            }
        }
    }
}

/// 分组计划生成器
#[derive(Debug, Default, Clone)]
pub struct PartitionPlanner;

impl PartitionPlanner {
    pub fn new() -> Self {
        Self
    }

    /// 生成按固定顺序排列的分组：核心组总是第一个，其余地域组总是最后一个
    pub fn plan(&self, province: Option<&str>, registered: &BTreeSet<String>) -> Vec<FilterGroup> {
        let core = FilterGroup {
            name: GroupName::Core,
            predicate: kb_type_is(KbType::Core),
            excluded_province: None,
        };

        let province = province.map(str::trim).filter(|p| !p.is_empty());
        let Some(province) = province else {
            return vec![
                core,
                FilterGroup {
                    name: GroupName::Others,
                    predicate: kb_type_is(KbType::Regional),
                    excluded_province: None,
                },
            ];
        };

        let target = FilterGroup {
            name: GroupName::TargetRegion,
            predicate: MetadataPredicate::equals(MetadataField::Province, province),
            excluded_province: None,
        };

        let province_clause = if registered.contains(province) {
            MetadataPredicate::is_in(
                MetadataField::Province,
                registered.iter().filter(|p| p.as_str() != province).cloned(),
            )
        } else {
            debug!(province, "Province not registered, using not-equal filter");
            MetadataPredicate::not_equal(MetadataField::Province, province)
        };

        let others = FilterGroup {
            name: GroupName::OtherRegions,
            predicate: MetadataPredicate::and(vec![kb_type_is(KbType::Regional), province_clause]),
            excluded_province: Some(province.to_string()),
        };

        vec![core, target, others]
    }
}

fn kb_type_is(kb_type: KbType) -> MetadataPredicate {
    MetadataPredicate::equals(MetadataField::KbType, kb_type.as_str())
}
