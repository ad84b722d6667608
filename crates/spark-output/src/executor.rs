//! # ObjectResultExecutor：输出阶段编排
//!
//! ## 核心意图（Why）
//! - 把内容类型解析、异步序列物化、格式化器选择与写出串成一条固定顺序的流水线；
//! - 协商失败不是错误：执行器把它转换为 406 状态码与一条诊断事件，并正常返回。
//!
//! ## 行为契约（What）
//! 1. 进入时请求已取消：返回 [`OutputError::Cancelled`]，不触碰响应；
//! 2. 对齐问题详情状态码，随后按 [`ContentTypeResolver`] 补全候选内容类型；
//! 3. 值为异步序列时排空为列表，并以列表类型替换有效类型；
//! 4. 调用选择器：
//!    - 无结果：发出 `no-writer-found` 事件，状态码置为 406，正文保持为空；
//!    - 有结果：发出 `writer-selected` 事件，执行结果级回调，再调用格式化器写出并透传其结果。
//!
//! ## 风险提示（Trade-offs）
//! - `writer-selected` 在写出前发出，写出失败时事件依然存在；
//! - 排空发生在选择之前，406 场景下序列同样会被完整消费。

use std::sync::Arc;

use crate::config::OutputOptions;
use crate::content_type::ContentTypeResolver;
use crate::context::OutputContext;
use crate::diagnostics::{DiagnosticSink, OutputEvent, TracingDiagnostics};
use crate::error::OutputError;
use crate::formatter::{OutputFormatterContext, OutputFormatterSelector};
use crate::materializer::{DrainBudget, Drained, MaterializationOutcome, SequenceMaterializer};
use crate::response::STATUS_NOT_ACCEPTABLE;
use crate::result::ObjectResult;
use crate::value::OutputValue;

/// 对象结果执行器。
///
/// # 教案式说明
/// - **意图 (Why)**：执行器本身无请求级状态，可在多个请求间共享（通常放入 `Arc`）；
/// - **契约 (What)**：
///   - 物化器默认使用进程级共享实例 [`SequenceMaterializer::global`]；
///   - 诊断出口默认转发到 `tracing`；
///   - `options.max_sequence_buffer` 限制单次排空的元素数量。
pub struct ObjectResultExecutor {
    selector: Arc<dyn OutputFormatterSelector>,
    materializer: Arc<SequenceMaterializer>,
    diagnostics: Arc<dyn DiagnosticSink>,
    options: OutputOptions,
}

impl ObjectResultExecutor {
    /// 以全局物化器与 `tracing` 诊断出口构造执行器。
    pub fn new(selector: Arc<dyn OutputFormatterSelector>, options: OutputOptions) -> Self {
        Self {
            selector,
            materializer: SequenceMaterializer::global(),
            diagnostics: Arc::new(TracingDiagnostics),
            options,
        }
    }

    /// 替换物化器；测试中用独立实例隔离转换器缓存计数。
    pub fn with_materializer(mut self, materializer: Arc<SequenceMaterializer>) -> Self {
        self.materializer = materializer;
        self
    }

    /// 替换诊断事件出口。
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// 写出对象结果。
    ///
    /// # 执行逻辑（How）
    /// - 物化与写出前各检查一次取消标记，排空过程中逐元素检查；
    /// - 选择器与格式化器的错误原样透传。
    pub async fn execute(
        &self,
        ctx: &OutputContext,
        result: &mut ObjectResult,
    ) -> Result<(), OutputError> {
        if ctx.cancellation().is_cancelled() {
            return Err(OutputError::Cancelled);
        }

        result.reconcile_problem_status();
        ContentTypeResolver::resolve(result, ctx.response().content_type().as_deref());

        let drained = match result.value() {
            Some(value) => self.materialize(ctx, value).await?,
            None => None,
        };
        let (object_type, object) = match &drained {
            Some(drained) => (Some(drained.list_type), Some(&drained.list)),
            None => (result.effective_type(), result.value()),
        };

        if ctx.cancellation().is_cancelled() {
            return Err(OutputError::Cancelled);
        }

        let mut negotiation =
            OutputFormatterContext::new(ctx, object_type, object, result.content_types());
        let selection =
            self.selector
                .select(&negotiation, result.formatters(), result.content_types())?;

        let Some(selection) = selection else {
            self.diagnostics.emit(&OutputEvent::NoFormatterFound {
                object_type,
                content_types: result.content_types(),
            });
            ctx.response().set_status(STATUS_NOT_ACCEPTABLE);
            return Ok(());
        };

        self.diagnostics.emit(&OutputEvent::FormatterSelected {
            formatter: selection.formatter.name(),
            content_type: &selection.content_type,
            object_type,
        });
        result.on_formatting(ctx);
        negotiation.set_content_type(selection.content_type);
        selection.formatter.write(&negotiation).await
    }

    async fn materialize(
        &self,
        ctx: &OutputContext,
        value: &OutputValue,
    ) -> Result<Option<Drained>, OutputError> {
        let budget = DrainBudget::new(ctx.cancellation().clone())
            .with_max_elements(self.options.max_sequence_buffer);
        match self.materializer.materialize(value, budget)? {
            MaterializationOutcome::NotApplicable => Ok(None),
            MaterializationOutcome::CompletedSync(drained) => Ok(Some(drained)),
            MaterializationOutcome::Pending(pending) => {
                tracing::trace!(
                    target: "spark_output::executor",
                    runtime_type = value.type_token().name(),
                    "awaiting pending async sequence"
                );
                pending.await.map(Some)
            }
        }
    }
}

impl std::fmt::Debug for ObjectResultExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectResultExecutor")
            .field("materializer", &self.materializer)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
