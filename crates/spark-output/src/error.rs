//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义输出阶段对外暴露的故障语义：前置条件、序列物化、格式化器写出与配置解析；
//! - 协商失败（406）不属于错误，由执行器以正常分支处理，因此不在此枚举中出现。
//!
//! ## 设计要求（What）
//! - 所有变体派生 `thiserror::Error`，可直接交给 `anyhow` 等上层框架；
//! - 每个变体映射到稳定错误码 `output.*`，便于日志与告警按码聚合；
//! - 执行器对格式化器返回的错误原样透传，不做包装或重试。

use std::borrow::Cow;

use thiserror::Error;

/// 外部来源错误的统一装箱形式。
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 稳定错误码常量。
pub mod codes {
    pub const PRECONDITION: &str = "output.precondition";
    pub const DRAIN_FAILED: &str = "output.sequence.drain_failed";
    pub const SEQUENCE_LIMIT: &str = "output.sequence.limit_exceeded";
    pub const SEQUENCE_CONSUMED: &str = "output.sequence.consumed";
    pub const TYPE_MISMATCH: &str = "output.type_mismatch";
    pub const CANCELLED: &str = "output.cancelled";
    pub const WRITE_FAILED: &str = "output.write_failed";
    pub const CONFIG: &str = "output.config";
}

/// 输出阶段错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：把物化、写出与配置三条路径的失败收敛为一个枚举，调用方以 `?` 传播即可；
/// - **契约 (What)**：
///   - 所有变体满足 `Send + Sync + 'static`，可跨线程传播；
///   - `Drain`/`Write` 保留底层 `source`，错误链可完整回溯；
///   - [`OutputError::code`] 返回稳定错误码；
/// - **风险 (Trade-offs)**：`Write` 由格式化器自行构造，执行器不会二次包装，因此格式化器需保证上下文充分。
#[derive(Debug, Error)]
pub enum OutputError {
    /// 调用前提不成立，例如没有任何可用的输出格式化器。
    #[error("precondition violated: {detail}")]
    Precondition { detail: Cow<'static, str> },

    /// 异步序列在生产过程中失败，已物化的元素全部丢弃。
    #[error("async sequence of `{element}` failed while draining")]
    Drain {
        element: &'static str,
        #[source]
        source: BoxError,
    },

    /// 序列产生的元素数量超过配置的缓冲上限。
    #[error("async sequence produced more than {limit} elements")]
    SequenceLimitExceeded { limit: usize },

    /// 同一个异步序列被重复物化。
    #[error("async sequence of `{element}` has already been consumed")]
    SequenceConsumed { element: &'static str },

    /// 运行时值与转换器期望的具体类型不一致。
    #[error("expected value of type `{expected}`, found `{found}`")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// 请求在挂起期间被取消。
    #[error("request cancelled before the result was written")]
    Cancelled,

    /// 格式化器写出失败。
    #[error("output formatter `{formatter}` failed to write the response")]
    Write {
        formatter: Cow<'static, str>,
        #[source]
        source: BoxError,
    },

    /// `OutputOptions` 解析失败。
    #[error("invalid output options: {0}")]
    Config(#[from] toml::de::Error),
}

impl OutputError {
    /// 构造前置条件错误。
    pub fn precondition(detail: impl Into<Cow<'static, str>>) -> Self {
        OutputError::Precondition {
            detail: detail.into(),
        }
    }

    /// 供格式化器构造写出错误的便捷入口。
    pub fn write(
        formatter: impl Into<Cow<'static, str>>,
        source: impl Into<BoxError>,
    ) -> Self {
        OutputError::Write {
            formatter: formatter.into(),
            source: source.into(),
        }
    }

    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            OutputError::Precondition { .. } => codes::PRECONDITION,
            OutputError::Drain { .. } => codes::DRAIN_FAILED,
            OutputError::SequenceLimitExceeded { .. } => codes::SEQUENCE_LIMIT,
            OutputError::SequenceConsumed { .. } => codes::SEQUENCE_CONSUMED,
            OutputError::TypeMismatch { .. } => codes::TYPE_MISMATCH,
            OutputError::Cancelled => codes::CANCELLED,
            OutputError::Write { .. } => codes::WRITE_FAILED,
            OutputError::Config(_) => codes::CONFIG,
        }
    }

    /// 是否为取消导致的失败。
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OutputError::Cancelled)
    }
}
