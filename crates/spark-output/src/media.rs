//! # media 模块：媒体类型与 Accept 解析
//!
//! ## 核心意图（Why）
//! - 内容协商需要比较“结果声明的候选类型”“请求 `Accept` 头”“格式化器支持的类型”三方，
//!   统一以 [`MediaType`] 表达，避免各处手写字符串切分；
//! - 候选集合 [`MediaTypeCollection`] 保持插入顺序且去重，先加入者在回显时优先。
//!
//! ## 行为契约（What）
//! - [`MediaType::is_subset_of`] 支持 `*/*`、`type/*`、结构化后缀通配 `type/*+json`，
//!   并要求集合方的非 `q` 参数在子集一方全部出现；
//! - [`parse_accept`] 跳过非法条目与 `q=0` 条目，按质量因子降序稳定排序。

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// `MediaType` 以 IANA `type/subtype[+suffix][; params]` 约定描述负载语义。
///
/// # 设计背景（Why）
/// - 通过 `Cow<'static, str>` 兼容静态常量与运行时解析出的请求头，避免多余复制；
/// - 解析按需进行，结构体本身只持有原始文本，可直接放入候选集合或日志字段。
///
/// # 契约说明（What）
/// - **前置条件**：[`MediaType::new`] 不做校验；来自外部输入时使用 [`MediaType::parse`]；
/// - **后置条件**：类型、子类型比较均大小写不敏感；`==` 与 `Hash` 同样按 ASCII 大小写不敏感的文本比较，
///   与 [`MediaTypeCollection`] 的去重规则一致。
#[derive(Clone, Debug)]
pub struct MediaType(Cow<'static, str>);

impl MediaType {
    /// `application/problem+json`。
    pub const PROBLEM_JSON: MediaType = MediaType(Cow::Borrowed("application/problem+json"));
    /// `application/problem+xml`。
    pub const PROBLEM_XML: MediaType = MediaType(Cow::Borrowed("application/problem+xml"));
    /// `*/*`。
    pub const ANY: MediaType = MediaType(Cow::Borrowed("*/*"));

    /// 创建新的媒体类型，不做格式校验。
    pub fn new(value: impl Into<Cow<'static, str>>) -> Self {
        Self(value.into())
    }

    /// 解析并校验 `type/subtype` 结构，非法输入返回 `None`。
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let candidate = Self(Cow::Owned(trimmed.to_owned()));
        let essence = candidate.essence();
        let (ty, subtype) = essence.split_once('/')?;
        let valid_token = |token: &str| {
            !token.is_empty()
                && !token.contains('/')
                && !token.chars().any(|c| c.is_whitespace() || c.is_control())
        };
        if valid_token(ty) && valid_token(subtype) {
            Some(candidate)
        } else {
            None
        }
    }

    /// 返回底层字符串表示。
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 去掉参数后的 `type/subtype` 部分。
    pub fn essence(&self) -> &str {
        self.0.split(';').next().unwrap_or_default().trim()
    }

    /// 主类型，例如 `application`。
    pub fn main_type(&self) -> &str {
        self.essence().split('/').next().unwrap_or_default()
    }

    /// 完整子类型，例如 `problem+json`。
    pub fn subtype(&self) -> &str {
        self.essence().split_once('/').map_or("", |(_, sub)| sub)
    }

    /// 结构化后缀之前的子类型部分，例如 `problem`。
    pub fn subtype_without_suffix(&self) -> &str {
        let subtype = self.subtype();
        subtype.rsplit_once('+').map_or(subtype, |(head, _)| head)
    }

    /// 结构化后缀，例如 `json`。
    pub fn suffix(&self) -> Option<&str> {
        self.subtype().rsplit_once('+').map(|(_, suffix)| suffix)
    }

    /// 迭代参数键值对，值两侧的引号会被剥离。
    pub fn parameters(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.split(';').skip(1).filter_map(|segment| {
            let (name, value) = segment.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name, value.trim().trim_matches('"')))
        })
    }

    /// 按名称读取参数，名称大小写不敏感。
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// 质量因子 `q`，缺省为 1.0，超界值被截断到 `[0, 1]`。
    pub fn quality(&self) -> f32 {
        self.parameter("q")
            .and_then(|raw| raw.parse::<f32>().ok())
            .filter(|q| q.is_finite())
            .map_or(1.0, |q| q.clamp(0.0, 1.0))
    }

    /// 是否为 `*/*`。
    pub fn matches_all_types(&self) -> bool {
        self.main_type() == "*"
    }

    /// 子类型是否为 `*`。
    pub fn matches_all_subtypes(&self) -> bool {
        self.subtype() == "*"
    }

    /// 判断 `self` 是否为 `set` 描述的集合的子集。
    ///
    /// # 契约说明（What）
    /// - `application/json` ⊂ `application/*` ⊂ `*/*`；
    /// - `application/problem+json` ⊂ `application/*+json`，也 ⊂ `application/json`（后缀匹配）；
    /// - `set` 中除 `q` 外的每个参数都必须在 `self` 中以相同值（大小写不敏感）出现。
    pub fn is_subset_of(&self, set: &MediaType) -> bool {
        self.matches_type(set) && self.matches_subtype(set) && self.contains_parameters_of(set)
    }

    fn matches_type(&self, set: &MediaType) -> bool {
        set.matches_all_types() || set.main_type().eq_ignore_ascii_case(self.main_type())
    }

    fn matches_subtype(&self, set: &MediaType) -> bool {
        if set.matches_all_types() || set.matches_all_subtypes() {
            return true;
        }
        match (set.suffix(), self.suffix()) {
            (Some(set_suffix), Some(own_suffix)) => {
                set_suffix.eq_ignore_ascii_case(own_suffix)
                    && (set.subtype_without_suffix() == "*"
                        || set
                            .subtype_without_suffix()
                            .eq_ignore_ascii_case(self.subtype_without_suffix()))
            }
            (Some(_), None) => false,
            (None, own_suffix) => {
                set.subtype().eq_ignore_ascii_case(self.subtype())
                    || own_suffix.is_some_and(|suffix| set.subtype().eq_ignore_ascii_case(suffix))
            }
        }
    }

    fn contains_parameters_of(&self, set: &MediaType) -> bool {
        set.parameters()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("q"))
            .all(|(name, expected)| {
                self.parameter(name)
                    .is_some_and(|actual| actual.eq_ignore_ascii_case(expected))
            })
    }
}

impl PartialEq for MediaType {
    fn eq(&self, other: &Self) -> bool {
        self.as_str().eq_ignore_ascii_case(other.as_str())
    }
}

impl Eq for MediaType {}

impl Hash for MediaType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.as_str().bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for MediaType {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MediaType {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// 结果携带的候选内容类型集合。
///
/// # 契约说明（What）
/// - 保持插入顺序，重复项（大小写不敏感）被忽略，先加入者优先；
/// - 只支持追加，不提供移除操作。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediaTypeCollection {
    items: Vec<MediaType>,
}

impl MediaTypeCollection {
    /// 创建空集合。
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个媒体类型；已存在时返回 `false`。
    pub fn insert(&mut self, media_type: impl Into<MediaType>) -> bool {
        let media_type = media_type.into();
        if self.contains(&media_type) {
            return false;
        }
        self.items.push(media_type);
        true
    }

    /// 是否已包含等价媒体类型。
    pub fn contains(&self, media_type: &MediaType) -> bool {
        self.items.contains(media_type)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<&MediaType> {
        self.items.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MediaType> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[MediaType] {
        &self.items
    }

    /// 以逗号拼接，供日志字段使用。
    pub fn joined(&self) -> String {
        self.items
            .iter()
            .map(MediaType::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl<'a> IntoIterator for &'a MediaTypeCollection {
    type Item = &'a MediaType;
    type IntoIter = std::slice::Iter<'a, MediaType>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<M> FromIterator<M> for MediaTypeCollection
where
    M: Into<MediaType>,
{
    fn from_iter<I: IntoIterator<Item = M>>(iter: I) -> Self {
        let mut collection = Self::new();
        for item in iter {
            collection.insert(item);
        }
        collection
    }
}

/// 解析 `Accept` 请求头。
///
/// # 行为逻辑（How）
/// 1. 以逗号拆分条目，逐一调用 [`MediaType::parse`]，非法条目直接跳过；
/// 2. 丢弃 `q=0` 的条目（客户端明确拒绝）；
/// 3. 按质量因子降序稳定排序，同质量保持头部原始顺序。
pub fn parse_accept(header: &str) -> Vec<MediaType> {
    let mut accepted: Vec<MediaType> = header
        .split(',')
        .filter_map(MediaType::parse)
        .filter(|media_type| media_type.quality() > 0.0)
        .collect();
    accepted.sort_by(|a, b| {
        b.quality()
            .partial_cmp(&a.quality())
            .unwrap_or(Ordering::Equal)
    });
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_suffix_is_split() {
        let media = MediaType::new("application/problem+json; charset=utf-8");
        assert_eq!(media.main_type(), "application");
        assert_eq!(media.subtype(), "problem+json");
        assert_eq!(media.subtype_without_suffix(), "problem");
        assert_eq!(media.suffix(), Some("json"));
        assert_eq!(media.parameter("CHARSET"), Some("utf-8"));
    }

    #[test]
    fn subset_rules_cover_wildcards_and_suffixes() {
        let json = MediaType::new("application/json");
        let problem = MediaType::PROBLEM_JSON;
        assert!(json.is_subset_of(&MediaType::ANY));
        assert!(json.is_subset_of(&MediaType::new("application/*")));
        assert!(!json.is_subset_of(&MediaType::new("text/*")));
        assert!(problem.is_subset_of(&MediaType::new("application/*+json")));
        assert!(problem.is_subset_of(&json));
        assert!(!json.is_subset_of(&MediaType::new("application/*+json")));
        assert!(!MediaType::ANY.is_subset_of(&json));
    }

    #[test]
    fn subset_requires_set_parameters() {
        let plain = MediaType::new("text/plain");
        let utf8 = MediaType::new("text/plain; charset=UTF-8");
        let wanted = MediaType::new("text/plain; charset=utf-8; q=0.5");
        assert!(utf8.is_subset_of(&wanted));
        assert!(!plain.is_subset_of(&wanted));
        assert!(utf8.is_subset_of(&plain));
    }

    #[test]
    fn parse_rejects_malformed_entries() {
        assert!(MediaType::parse("application/json").is_some());
        assert!(MediaType::parse("  text/html ; level=1 ").is_some());
        assert!(MediaType::parse("json").is_none());
        assert!(MediaType::parse("application/").is_none());
        assert!(MediaType::parse("a/b/c").is_none());
    }

    #[test]
    fn accept_header_is_sorted_by_quality_and_stable() {
        let accepted =
            parse_accept("text/html;q=0.5, application/json, bogus, application/xml, */*;q=0");
        let rendered: Vec<&str> = accepted.iter().map(MediaType::essence).collect();
        assert_eq!(rendered, ["application/json", "application/xml", "text/html"]);
    }

    #[test]
    fn collection_keeps_first_insertion() {
        let mut collection = MediaTypeCollection::new();
        assert!(collection.insert("application/json"));
        assert!(collection.insert("text/plain"));
        assert!(!collection.insert("APPLICATION/JSON"));
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.first().map(MediaType::as_str), Some("application/json"));
        assert_eq!(collection.joined(), "application/json, text/plain");
    }

    #[test]
    fn equality_and_hash_ignore_ascii_case() {
        use std::collections::HashSet;

        let upper = MediaType::new("Application/JSON; Charset=UTF-8");
        let lower = MediaType::new("application/json; charset=utf-8");
        assert_eq!(upper, lower);
        assert_ne!(upper, MediaType::new("application/json"));

        let set: HashSet<MediaType> = [upper, lower].into_iter().collect();
        assert_eq!(set.len(), 1);

        let mut collection = MediaTypeCollection::new();
        assert!(collection.insert(MediaType::PROBLEM_JSON));
        assert!(collection.contains(&MediaType::new("APPLICATION/PROBLEM+JSON")));
    }
}
