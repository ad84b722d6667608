//! # problem 模块：RFC 7807 问题详情
//!
//! ## 核心意图（Why）
//! - 错误描述是最常见的结构化返回值之一，内容类型推断需要识别它并默认给出
//!   `application/problem+json`、`application/problem+xml` 两个候选；
//! - 结构体派生 `serde`，外部 JSON/XML 格式化器可直接序列化。
//!
//! ## 行为契约（What）
//! - [`is_problem_details`] 识别 [`ProblemDetails`] 与 [`ValidationProblemDetails`]；
//! - [`ProblemShape`] 提供两者共享的状态码读写，用于执行前的状态码对齐。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::OutputValue;

/// RFC 7807 问题详情。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// 扩展成员，序列化时与标准字段平铺。
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl ProblemDetails {
    pub fn new(status: u16, title: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }
}

/// 携带字段级校验错误的问题详情。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationProblemDetails {
    #[serde(flatten)]
    pub problem: ProblemDetails,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationProblemDetails {
    pub fn new(errors: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            problem: ProblemDetails {
                title: Some("One or more validation errors occurred.".to_owned()),
                ..ProblemDetails::default()
            },
            errors,
        }
    }
}

/// 问题详情形态的公共访问面。
pub trait ProblemShape {
    fn status(&self) -> Option<u16>;
    fn set_status(&mut self, status: u16);
}

impl ProblemShape for ProblemDetails {
    fn status(&self) -> Option<u16> {
        self.status
    }

    fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }
}

impl ProblemShape for ValidationProblemDetails {
    fn status(&self) -> Option<u16> {
        self.problem.status
    }

    fn set_status(&mut self, status: u16) {
        self.problem.status = Some(status);
    }
}

/// 值是否为已知的问题详情形态。
pub fn is_problem_details(value: &OutputValue) -> bool {
    value.is::<ProblemDetails>() || value.is::<ValidationProblemDetails>()
}

/// 以可变形式借出问题详情形态。
pub(crate) fn problem_shape_mut(value: &mut OutputValue) -> Option<&mut dyn ProblemShape> {
    if value.is::<ProblemDetails>() {
        return value
            .downcast_mut::<ProblemDetails>()
            .map(|problem| problem as &mut dyn ProblemShape);
    }
    value
        .downcast_mut::<ValidationProblemDetails>()
        .map(|problem| problem as &mut dyn ProblemShape)
}
