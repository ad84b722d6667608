#![doc = "spark-output: 请求管线的结果输出阶段。"]
#![deny(unsafe_code)]

//! # spark-output
//!
//! ## 定位与职责（Why）
//! - 承接请求管线末端的“对象结果写出”：决定以何种内容类型、由哪个格式化器写出应用返回的值；
//! - 应用可以返回尚未产出完毕的异步序列，写出前由物化器排空为列表，格式化器只面对具体值；
//! - 协商失败转换为 406 与诊断事件，而非错误。
//!
//! ## 架构嵌入（Where）
//! - `value` 定义类型令牌与类型擦除的输出值，`materializer` 在其上实现带缓存的序列排空；
//! - `media`/`content_type`/`formatter` 组成内容协商：媒体类型代数、候选内容类型推断与格式化器选择；
//! - `executor` 把上述步骤编排为一次 `execute` 调用，`diagnostics` 负责事件出口；
//! - `response`/`context` 是与宿主 HTTP 层之间的最小接口，`config` 承载可从 TOML 加载的策略开关。
//!
//! ## 扩展指引（How）
//! - 新的写出格式实现 [`OutputFormatter`] 并注册到 [`DefaultFormatterSelector`]；
//! - 需要自定义选择策略时实现 [`OutputFormatterSelector`]；
//! - 需要接入指标或审计时实现 [`DiagnosticSink`]。

/// 输出阶段配置。
pub mod config;

/// 候选内容类型推断。
pub mod content_type;

/// 请求级输出上下文与取消标记。
pub mod context;

/// 诊断事件与事件出口。
pub mod diagnostics;

/// 错误类型与稳定错误码。
///
/// - **意图说明 (Why)**：集中描述物化、协商与写出阶段的故障；
/// - **契约定位 (What)**：以 `thiserror::Error` 派生，每个变体对应一个稳定错误码。
pub mod error;

/// 输出阶段编排。
pub mod executor;

/// 格式化器契约与默认选择器。
pub mod formatter;

/// 媒体类型解析与匹配。
pub mod media;

/// 异步序列物化与转换器缓存。
pub mod materializer;

/// 问题详情负载。
pub mod problem;

/// 响应可写面。
pub mod response;

/// 对象结果。
pub mod result;

/// 可观察的格式化器与诊断出口桩，供测试复用。
pub mod test_stubs;

/// 类型令牌与类型擦除的输出值。
pub mod value;

pub use config::OutputOptions;
pub use content_type::ContentTypeResolver;
pub use context::{Cancellation, Cancelled, OutputContext};
pub use diagnostics::{DiagnosticSink, OutputEvent, TracingDiagnostics};
pub use error::{BoxError, OutputError};
pub use executor::ObjectResultExecutor;
pub use formatter::{
    DefaultFormatterSelector, FormatterSelection, OutputFormatter, OutputFormatterContext,
    OutputFormatterSelector,
};
pub use materializer::{
    DrainBudget, Drained, MaterializationOutcome, SequenceDrain, SequenceMaterializer,
};
pub use media::{MediaType, MediaTypeCollection};
pub use problem::{ProblemDetails, ValidationProblemDetails};
pub use response::{BufferedResponse, ResponseSink};
pub use result::ObjectResult;
pub use value::{AsyncSequence, OutputValue, TypeToken};
