//! 地域识别 - 从问题文本中识别省级行政区

use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

/// 地域识别器
pub trait RegionResolver: Send + Sync {
    /// 识别文本中提及的省份（简称），未识别返回 None
    fn resolve(&self, text: &str) -> Option<String>;

    /// 识别器能够识别的全部省份（简称）
    fn known_provinces(&self) -> BTreeSet<String>;
}

/// 省级行政区简称及其全称/别名
const PROVINCES: &[(&str, &[&str])] = &[
    ("北京", &["北京市"]),
    ("天津", &["天津市"]),
    ("上海", &["上海市"]),
    ("重庆", &["重庆市"]),
    ("河北", &["河北省"]),
    ("山西", &["山西省"]),
    ("辽宁", &["辽宁省"]),
    ("吉林", &["吉林省"]),
    ("黑龙江", &["黑龙江省"]),
    ("江苏", &["江苏省"]),
    ("浙江", &["浙江省"]),
    ("安徽", &["安徽省"]),
    ("福建", &["福建省"]),
    ("江西", &["江西省"]),
    ("山东", &["山东省"]),
    ("河南", &["河南省"]),
    ("湖北", &["湖北省"]),
    ("湖南", &["湖南省"]),
    ("广东", &["广东省"]),
    ("海南", &["海南省"]),
    ("四川", &["四川省"]),
    ("贵州", &["贵州省"]),
    ("云南", &["云南省"]),
    ("陕西", &["陕西省"]),
    ("甘肃", &["甘肃省"]),
    ("青海", &["青海省"]),
    ("台湾", &["台湾省"]),
    ("内蒙古", &["内蒙古自治区"]),
    ("广西", &["广西壮族自治区", "广西自治区"]),
    ("西藏", &["西藏自治区"]),
    ("宁夏", &["宁夏回族自治区", "宁夏自治区"]),
    ("新疆", &["新疆维吾尔自治区", "新疆自治区"]),
    ("香港", &["香港特别行政区", "香港特区"]),
    ("澳门", &["澳门特别行政区", "澳门特区"]),
];

/// 别名 → 简称
static ALIAS_TO_PROVINCE: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for (short, aliases) in PROVINCES {
        map.insert(*short, *short);
        for alias in *aliases {
            map.insert(*alias, *short);
        }
    }
    map
});

/// 所有别名按长度降序组成的交替模式：最左匹配优先，同一位置取最长别名
static ALIAS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let mut aliases: Vec<&str> = ALIAS_TO_PROVINCE.keys().copied().collect();
    aliases.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
    let pattern = aliases
        .iter()
        .map(|a| regex::escape(a))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&pattern).expect("province alias pattern is built from escaped literals")
});

/// 基于静态别名表的地域识别器
#[derive(Debug, Default, Clone)]
pub struct PatternRegionResolver;

impl PatternRegionResolver {
    pub fn new() -> Self {
        Self
    }
}

impl RegionResolver for PatternRegionResolver {
    fn resolve(&self, text: &str) -> Option<String> {
        let matched = ALIAS_PATTERN.find(text)?;
        ALIAS_TO_PROVINCE
            .get(matched.as_str())
            .map(|short| short.to_string())
    }

    fn known_provinces(&self) -> BTreeSet<String> {
        PROVINCES.iter().map(|(short, _)| short.to_string()).collect()
    }
}
