use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

/// 知识库类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KbType {
    /// 中央（核心）文档
    Core,
    /// 地方（省级）文档
    Regional,
}

impl KbType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KbType::Core => "core",
            KbType::Regional => "regional",
        }
    }
}

impl fmt::Display for KbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for KbType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "core" => Ok(KbType::Core),
            "regional" => Ok(KbType::Regional),
            _ => Err(format!("Unknown kb_type: {}", s)),
        }
    }
}

/// 可参与过滤的元数据字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataField {
    KbType,
    Province,
}

impl MetadataField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataField::KbType => "kb_type",
            MetadataField::Province => "province",
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 切片元数据，写入向量库时随切片一起保存
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub kb_type: KbType,
    pub province: String,
    pub source_name: String,
    pub chunk_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
}

impl ChunkMetadata {
    /// 切片的唯一标识 `source_name::chunk_id`
    pub fn reference_id(&self) -> String {
        format!("{}::{}", self.source_name, self.chunk_id)
    }

    fn field_value(&self, field: MetadataField) -> &str {
        match field {
            MetadataField::KbType => self.kb_type.as_str(),
            MetadataField::Province => &self.province,
        }
    }
}

/// 元数据过滤表达式
///
/// 与向量库过滤DSL等价的最小表达式树：相等、集合包含、不等以及合取。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataPredicate {
    Equals { field: MetadataField, value: String },
    In { field: MetadataField, values: Vec<String> },
    NotEqual { field: MetadataField, value: String },
    And(Vec<MetadataPredicate>),
}

impl MetadataPredicate {
    pub fn equals(field: MetadataField, value: impl Into<String>) -> Self {
        MetadataPredicate::Equals {
            field,
            value: value.into(),
        }
    }

    pub fn is_in<I, S>(field: MetadataField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MetadataPredicate::In {
            field,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn not_equal(field: MetadataField, value: impl Into<String>) -> Self {
        MetadataPredicate::NotEqual {
            field,
            value: value.into(),
        }
    }

    pub fn and(clauses: Vec<MetadataPredicate>) -> Self {
        MetadataPredicate::And(clauses)
    }

    /// 判断切片元数据是否满足该表达式
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        match self {
            MetadataPredicate::Equals { field, value } => metadata.field_value(*field) == value,
            MetadataPredicate::In { field, values } => {
                let actual = metadata.field_value(*field);
                values.iter().any(|v| v == actual)
            }
            MetadataPredicate::NotEqual { field, value } => metadata.field_value(*field) != value,
            MetadataPredicate::And(clauses) => clauses.iter().all(|c| c.matches(metadata)),
        }
    }

    /// 转换为 where 风格的JSON过滤条件（`$in` / `$ne` / `$and`）
    pub fn to_where(&self) -> Value {
        match self {
            MetadataPredicate::Equals { field, value } => json!({ field.as_str(): value }),
            MetadataPredicate::In { field, values } => {
                json!({ field.as_str(): { "$in": values } })
            }
            MetadataPredicate::NotEqual { field, value } => {
                json!({ field.as_str(): { "$ne": value } })
            }
            MetadataPredicate::And(clauses) => {
                json!({ "$and": clauses.iter().map(|c| c.to_where()).collect::<Vec<_>>() })
            }
        }
    }

    /// 查找作用在某字段上的 `IN` 集合（含嵌套在 `And` 中的子句）
    pub fn in_values(&self, target: MetadataField) -> Option<&[String]> {
        match self {
            MetadataPredicate::In { field, values } if *field == target => Some(values),
            MetadataPredicate::And(clauses) => clauses.iter().find_map(|c| c.in_values(target)),
            _ => None,
        }
    }

    /// 查找作用在某字段上的 `!=` 值（含嵌套在 `And` 中的子句）
    pub fn not_equal_value(&self, target: MetadataField) -> Option<&str> {
        match self {
            MetadataPredicate::NotEqual { field, value } if *field == target => Some(value),
            MetadataPredicate::And(clauses) => {
                clauses.iter().find_map(|c| c.not_equal_value(target))
            }
            _ => None,
        }
    }
}

/// 紧凑形式，便于写入日志，如 `kb_type=regional;province IN [广东,辽宁]`
impl fmt::Display for MetadataPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataPredicate::Equals { field, value } => write!(f, "{}={}", field, value),
            MetadataPredicate::In { field, values } => {
                write!(f, "{} IN [{}]", field, values.join(","))
            }
            MetadataPredicate::NotEqual { field, value } => write!(f, "{}!={}", field, value),
            MetadataPredicate::And(clauses) => {
                let parts: Vec<String> = clauses.iter().map(|c| c.to_string()).collect();
                f.write_str(&parts.join(";"))
            }
        }
    }
}
