//! # result 模块：待写出的对象结果
//!
//! ## 核心意图（Why）
//! - 应用逻辑以 [`ObjectResult`] 描述“要写出什么”：声明类型、运行时值、候选内容类型、
//!   结果级格式化器覆盖列表，以及写出前的状态码与钩子；
//! - 有效类型规则集中在 [`ObjectResult::effective_type`]，执行器在物化前后都依赖它。

use std::fmt;
use std::sync::Arc;

use crate::context::OutputContext;
use crate::formatter::OutputFormatter;
use crate::media::{MediaType, MediaTypeCollection};
use crate::problem::problem_shape_mut;
use crate::value::{OutputValue, TypeToken};

/// 写出前回调，可在最后时刻调整响应头。
pub type FormattingHook = Arc<dyn Fn(&OutputContext) + Send + Sync>;

/// 对象结果。
///
/// # 教案式说明
/// - **意图 (Why)**：作为请求级数据载体，由调用方创建，执行器只追加内容类型；
/// - **契约 (What)**：
///   - `declared_type` 为 `None` 或 [`TypeToken::any`] 时，有效类型取运行时值的具体类型；
///   - `content_types` 仅支持追加；
///   - `formatters` 非空时覆盖全局注册表；
///   - `status_code` 在选中格式化器后、写出前应用到响应。
#[derive(Default)]
pub struct ObjectResult {
    declared_type: Option<TypeToken>,
    value: Option<OutputValue>,
    content_types: MediaTypeCollection,
    formatters: Vec<Arc<dyn OutputFormatter>>,
    status_code: Option<u16>,
    on_formatting: Option<FormattingHook>,
}

impl ObjectResult {
    pub fn new(value: OutputValue) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    /// 不携带值的结果。
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_declared_type(mut self, declared: TypeToken) -> Self {
        self.declared_type = Some(declared);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<MediaType>) -> Self {
        self.content_types.insert(content_type);
        self
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn OutputFormatter>) -> Self {
        self.formatters.push(formatter);
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_formatting_hook(
        mut self,
        hook: impl Fn(&OutputContext) + Send + Sync + 'static,
    ) -> Self {
        self.on_formatting = Some(Arc::new(hook));
        self
    }

    pub fn declared_type(&self) -> Option<TypeToken> {
        self.declared_type
    }

    pub fn value(&self) -> Option<&OutputValue> {
        self.value.as_ref()
    }

    pub fn content_types(&self) -> &MediaTypeCollection {
        &self.content_types
    }

    pub fn content_types_mut(&mut self) -> &mut MediaTypeCollection {
        &mut self.content_types
    }

    /// 结果级格式化器覆盖列表，可能为空。
    pub fn formatters(&self) -> &[Arc<dyn OutputFormatter>] {
        &self.formatters
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// 物化前的有效类型。
    pub fn effective_type(&self) -> Option<TypeToken> {
        match self.declared_type {
            Some(declared) if !declared.is_any() => Some(declared),
            _ => self.value.as_ref().map(OutputValue::type_token),
        }
    }

    /// 对齐结果状态码与问题详情中的 `status`。
    ///
    /// - 结果无状态码而问题详情有：结果采用问题详情的状态码；
    /// - 问题详情无状态码而结果有：问题详情采用结果的状态码。
    pub fn reconcile_problem_status(&mut self) {
        let Some(shape) = self.value.as_mut().and_then(problem_shape_mut) else {
            return;
        };
        match (self.status_code, shape.status()) {
            (None, Some(problem_status)) => self.status_code = Some(problem_status),
            (Some(status), None) => shape.set_status(status),
            _ => {}
        }
    }

    /// 选中格式化器之后、写出之前调用。
    pub(crate) fn on_formatting(&self, ctx: &OutputContext) {
        if let Some(status) = self.status_code {
            ctx.response().set_status(status);
        }
        if let Some(hook) = &self.on_formatting {
            hook(ctx);
        }
    }
}

impl fmt::Debug for ObjectResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectResult")
            .field("declared_type", &self.declared_type)
            .field("value", &self.value)
            .field("content_types", &self.content_types)
            .field("formatters", &self.formatters.len())
            .field("status_code", &self.status_code)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ProblemDetails;

    #[test]
    fn declared_type_wins_unless_it_is_any() {
        let result = ObjectResult::new(OutputValue::new(5_u8))
            .with_declared_type(TypeToken::of::<u32>());
        assert_eq!(result.effective_type(), Some(TypeToken::of::<u32>()));

        let result =
            ObjectResult::new(OutputValue::new(5_u8)).with_declared_type(TypeToken::any());
        assert_eq!(result.effective_type(), Some(TypeToken::of::<u8>()));
    }

    #[test]
    fn absent_value_without_declaration_has_no_type() {
        assert_eq!(ObjectResult::empty().effective_type(), None);
        let declared = ObjectResult::empty().with_declared_type(TypeToken::of::<String>());
        assert_eq!(declared.effective_type(), Some(TypeToken::of::<String>()));
    }

    #[test]
    fn problem_status_flows_into_result() {
        let mut result = ObjectResult::new(OutputValue::new(ProblemDetails::new(409, "Conflict")));
        result.reconcile_problem_status();
        assert_eq!(result.status_code(), Some(409));
    }

    #[test]
    fn result_status_flows_into_problem() {
        let mut result =
            ObjectResult::new(OutputValue::new(ProblemDetails::default())).with_status(500);
        result.reconcile_problem_status();
        let problem = result.value().unwrap().downcast_ref::<ProblemDetails>().unwrap();
        assert_eq!(problem.status, Some(500));
    }
}
