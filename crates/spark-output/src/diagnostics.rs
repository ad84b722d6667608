//! # diagnostics 模块：输出阶段诊断事件
//!
//! ## 核心意图（Why）
//! - 协商结果（选中某个格式化器 / 没有可接受的表示）需要可观测，但不属于错误；
//! - 以 [`DiagnosticSink`] 抽象事件出口，默认实现 [`TracingDiagnostics`] 转发为 `tracing` 事件。
//!
//! ## 行为契约（What）
//! - `emit` 不返回错误：事件发送失败不得影响输出流程；
//! - 事件字段覆盖候选类型、候选内容类型与选中的格式化器标识。

use std::fmt;

use crate::media::{MediaType, MediaTypeCollection};
use crate::value::TypeToken;

/// 诊断事件。
#[derive(Clone, Copy, Debug)]
pub enum OutputEvent<'a> {
    /// 没有格式化器接受任何候选内容类型。
    NoFormatterFound {
        object_type: Option<TypeToken>,
        content_types: &'a MediaTypeCollection,
    },
    /// 已选中格式化器，记录时机与后续写出结果无关。
    FormatterSelected {
        formatter: &'a str,
        content_type: &'a MediaType,
        object_type: Option<TypeToken>,
    },
}

impl OutputEvent<'_> {
    /// 事件名称，用于日志字段与指标标签。
    pub fn name(&self) -> &'static str {
        match self {
            OutputEvent::NoFormatterFound { .. } => "no-writer-found",
            OutputEvent::FormatterSelected { .. } => "writer-selected",
        }
    }
}

/// 诊断事件出口。
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: &OutputEvent<'_>);
}

/// 基于 `tracing` 的默认诊断出口。
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn emit(&self, event: &OutputEvent<'_>) {
        match event {
            OutputEvent::NoFormatterFound {
                object_type,
                content_types,
            } => tracing::debug!(
                target: "spark_output::executor",
                event = event.name(),
                object_type = %DisplayType(*object_type),
                content_types = %content_types.joined(),
                "no output formatter accepts the candidate content types"
            ),
            OutputEvent::FormatterSelected {
                formatter,
                content_type,
                object_type,
            } => tracing::debug!(
                target: "spark_output::executor",
                event = event.name(),
                formatter = *formatter,
                content_type = %content_type,
                object_type = %DisplayType(*object_type),
                "output formatter selected"
            ),
        }
    }
}

struct DisplayType(Option<TypeToken>);

impl fmt::Display for DisplayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(token) => f.write_str(token.name()),
            None => f.write_str("<none>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn tracing_sink_emits_structured_fields() {
        let content_types: MediaTypeCollection = ["application/json"].into_iter().collect();
        TracingDiagnostics.emit(&OutputEvent::NoFormatterFound {
            object_type: Some(TypeToken::of::<u32>()),
            content_types: &content_types,
        });
        assert!(logs_contain("no-writer-found"));
        assert!(logs_contain("application/json"));

        let json = MediaType::new("application/json");
        TracingDiagnostics.emit(&OutputEvent::FormatterSelected {
            formatter: "json",
            content_type: &json,
            object_type: None,
        });
        assert!(logs_contain("writer-selected"));
        assert!(logs_contain("<none>"));
    }
}
