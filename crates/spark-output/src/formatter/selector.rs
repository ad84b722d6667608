//! # DefaultFormatterSelector：默认格式化器选择器
//!
//! ## 核心意图（Why）
//! - 提供与常见 Web 框架一致的选择算法，把请求 `Accept`、结果候选内容类型与注册表三方合并；
//! - 选择器只做决策，不写响应，也不记录诊断事件（由执行器负责）。
//!
//! ## 行为逻辑（How）
//! 1. 候选列表非空则使用候选，否则使用注册表；两者皆空返回前置条件错误；
//! 2. `Accept` 含 `*/*` 且未开启 `respect_browser_accept_header` 时忽略整个 `Accept`；
//! 3. 无 `Accept`：候选内容类型为空取首个可写格式化器，否则按“格式化器 × 内容类型”顺序匹配；
//! 4. 有 `Accept`：按质量顺序逐个匹配；候选内容类型非空时只考虑属于该 `Accept` 项的内容类型；
//! 5. 第 4 步无结果且未开启 `return_http_not_acceptable` 时回退到第 3 步。

use std::sync::Arc;

use crate::config::OutputOptions;
use crate::error::OutputError;
use crate::media::{MediaType, MediaTypeCollection};

use super::{FormatterSelection, OutputFormatter, OutputFormatterContext, OutputFormatterSelector};

/// 持有全局格式化器注册表的默认选择器。
#[derive(Clone, Default)]
pub struct DefaultFormatterSelector {
    options: OutputOptions,
    formatters: Vec<Arc<dyn OutputFormatter>>,
}

impl DefaultFormatterSelector {
    pub fn new(options: OutputOptions) -> Self {
        Self {
            options,
            formatters: Vec::new(),
        }
    }

    /// 向全局注册表追加格式化器，注册顺序即优先顺序。
    pub fn with_formatter(mut self, formatter: Arc<dyn OutputFormatter>) -> Self {
        self.formatters.push(formatter);
        self
    }

    pub fn register(&mut self, formatter: Arc<dyn OutputFormatter>) {
        self.formatters.push(formatter);
    }

    pub fn formatters(&self) -> &[Arc<dyn OutputFormatter>] {
        &self.formatters
    }

    fn effective_accept<'c>(&self, ctx: &'c OutputFormatterContext<'_>) -> &'c [MediaType] {
        let accept = ctx.output().accept();
        if !self.options.respect_browser_accept_header
            && accept.iter().any(MediaType::matches_all_types)
        {
            return &[];
        }
        accept
    }
}

impl std::fmt::Debug for DefaultFormatterSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.formatters.iter().map(|f| f.name()).collect();
        f.debug_struct("DefaultFormatterSelector")
            .field("options", &self.options)
            .field("formatters", &names)
            .finish()
    }
}

impl OutputFormatterSelector for DefaultFormatterSelector {
    fn select(
        &self,
        ctx: &OutputFormatterContext<'_>,
        candidates: &[Arc<dyn OutputFormatter>],
        content_types: &MediaTypeCollection,
    ) -> Result<Option<FormatterSelection>, OutputError> {
        let formatters = if candidates.is_empty() {
            self.formatters.as_slice()
        } else {
            candidates
        };
        if formatters.is_empty() {
            return Err(OutputError::precondition(
                "no output formatters configured for the result",
            ));
        }

        let accept = self.effective_accept(ctx);
        if accept.is_empty() {
            return Ok(select_without_accept(ctx, formatters, content_types));
        }

        let selected = if content_types.is_empty() {
            select_using_accept(ctx, formatters, accept)
        } else {
            select_using_accept_and_content_types(ctx, formatters, accept, content_types)
        };
        if selected.is_some() || self.options.return_http_not_acceptable {
            return Ok(selected);
        }
        Ok(select_without_accept(ctx, formatters, content_types))
    }
}

fn try_formatter(
    ctx: &OutputFormatterContext<'_>,
    formatter: &Arc<dyn OutputFormatter>,
    content_type: Option<&MediaType>,
) -> Option<FormatterSelection> {
    formatter
        .can_write_result(ctx, content_type)
        .map(|content_type| FormatterSelection {
            formatter: Arc::clone(formatter),
            content_type,
        })
}

fn select_without_accept(
    ctx: &OutputFormatterContext<'_>,
    formatters: &[Arc<dyn OutputFormatter>],
    content_types: &MediaTypeCollection,
) -> Option<FormatterSelection> {
    if content_types.is_empty() {
        return formatters
            .iter()
            .find_map(|formatter| try_formatter(ctx, formatter, None));
    }
    formatters.iter().find_map(|formatter| {
        content_types
            .iter()
            .find_map(|content_type| try_formatter(ctx, formatter, Some(content_type)))
    })
}

fn select_using_accept(
    ctx: &OutputFormatterContext<'_>,
    formatters: &[Arc<dyn OutputFormatter>],
    accept: &[MediaType],
) -> Option<FormatterSelection> {
    accept.iter().find_map(|accepted| {
        formatters
            .iter()
            .find_map(|formatter| try_formatter(ctx, formatter, Some(accepted)))
    })
}

fn select_using_accept_and_content_types(
    ctx: &OutputFormatterContext<'_>,
    formatters: &[Arc<dyn OutputFormatter>],
    accept: &[MediaType],
    content_types: &MediaTypeCollection,
) -> Option<FormatterSelection> {
    accept.iter().find_map(|accepted| {
        content_types
            .iter()
            .filter(|content_type| content_type.is_subset_of(accepted))
            .find_map(|content_type| {
                formatters
                    .iter()
                    .find_map(|formatter| try_formatter(ctx, formatter, Some(content_type)))
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OutputContext;
    use crate::response::BufferedResponse;
    use crate::test_stubs::StubFormatter;

    fn context(accept: Option<&str>) -> OutputContext {
        let ctx = OutputContext::new(Arc::new(BufferedResponse::new()));
        match accept {
            Some(header) => ctx.with_accept_header(header),
            None => ctx,
        }
    }

    fn names(selection: Option<FormatterSelection>) -> Option<(String, String)> {
        selection.map(|s| (s.formatter.name().to_owned(), s.content_type.to_string()))
    }

    #[test]
    fn registry_is_used_when_no_candidates() {
        let selector = DefaultFormatterSelector::default()
            .with_formatter(Arc::new(StubFormatter::new("json", ["application/json"])));
        let output = context(None);
        let content_types = MediaTypeCollection::new();
        let ctx = OutputFormatterContext::new(&output, None, None, &content_types);
        let selected = selector.select(&ctx, &[], &content_types).unwrap();
        assert_eq!(
            names(selected),
            Some(("json".to_owned(), "application/json".to_owned()))
        );
    }

    #[test]
    fn result_candidates_override_registry() {
        let selector = DefaultFormatterSelector::default()
            .with_formatter(Arc::new(StubFormatter::new("json", ["application/json"])));
        let scoped: Arc<dyn OutputFormatter> =
            Arc::new(StubFormatter::new("csv", ["text/csv"]));
        let output = context(None);
        let content_types = MediaTypeCollection::new();
        let ctx = OutputFormatterContext::new(&output, None, None, &content_types);
        let selected = selector.select(&ctx, &[scoped], &content_types).unwrap();
        assert_eq!(names(selected).map(|(name, _)| name), Some("csv".to_owned()));
    }

    #[test]
    fn empty_registry_is_a_precondition_violation() {
        let selector = DefaultFormatterSelector::default();
        let output = context(None);
        let content_types = MediaTypeCollection::new();
        let ctx = OutputFormatterContext::new(&output, None, None, &content_types);
        let err = selector.select(&ctx, &[], &content_types).unwrap_err();
        assert!(matches!(err, OutputError::Precondition { .. }));
    }

    #[test]
    fn wildcard_accept_is_ignored_by_default() {
        let selector = DefaultFormatterSelector::default()
            .with_formatter(Arc::new(StubFormatter::new("json", ["application/json"])))
            .with_formatter(Arc::new(StubFormatter::new("xml", ["application/xml"])));
        let output = context(Some("application/xml, */*;q=0.8"));
        let content_types = MediaTypeCollection::new();
        let ctx = OutputFormatterContext::new(&output, None, None, &content_types);
        let selected = selector.select(&ctx, &[], &content_types).unwrap();
        assert_eq!(names(selected).map(|(name, _)| name), Some("json".to_owned()));
    }
}
