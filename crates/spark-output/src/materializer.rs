//! # SequenceMaterializer：异步序列物化器
//!
//! ## 核心意图（Why）
//! - 应用逻辑可以返回尚未产出完毕的异步序列；格式化器只处理具体值，因此写出前需要把序列
//!   完整排空为 `Vec<T>`，并把有效类型替换为列表类型；
//! - 判断“是否为元素类型 T 的异步序列”以及构造对应的排空函数都发生在首次遇到某个运行时类型时，
//!   结果以 `TypeId` 为键缓存在 `DashMap` 中，此后同类型请求只做一次并发读取。
//!
//! ## 行为契约（What）
//! - [`SequenceMaterializer::materialize`] 返回带标签的 [`MaterializationOutcome`]：
//!   `NotApplicable` 与“空列表” `CompletedSync` 在类型上可区分；
//! - 排空保持生产顺序，不跳过、不重复、不重排；
//! - 取消（丢弃 Future 或取消标记置位）、超出缓冲上限、序列故障都会丢弃已收集的部分列表；
//!   取消标记置位会唤醒挂起中的排空，无需等待生产方产出下一个元素；
//! - 并发首次访问同一类型可能重复构建转换器，后写覆盖先写；转换器无状态，结果等价。
//!
//! ## 风险提示（Trade-offs）
//! - 缓存没有淘汰策略，规模受进程内出现过的具体返回类型数量约束。

use std::any::{Any, TypeId, type_name};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::task::{Context, Poll};

use dashmap::DashMap;
use futures::future::{self, BoxFuture, Either};
use futures::stream::{BoxStream, StreamExt};
use futures::task::noop_waker_ref;

use crate::context::Cancellation;
use crate::error::{BoxError, OutputError};
use crate::value::{AsyncSequence, OutputValue, TypeToken};

/// 排空完成后的列表及其类型。
#[derive(Debug)]
pub struct Drained {
    pub list_type: TypeToken,
    pub list: OutputValue,
}

impl Drained {
    fn from_list(list: OutputValue) -> Self {
        Self {
            list_type: list.type_token(),
            list,
        }
    }
}

/// 挂起中的排空任务。
pub type PendingDrain = BoxFuture<'static, Result<Drained, OutputError>>;

/// 物化结果。
///
/// # 契约说明（What）
/// - `NotApplicable`：值不是异步序列，调用方保持原有效类型与值不变；
/// - `CompletedSync`：序列在首次轮询内已排空（包括空序列）；
/// - `Pending`：序列尚未产出完毕，调用方需要等待该 Future。
pub enum MaterializationOutcome {
    NotApplicable,
    CompletedSync(Drained),
    Pending(PendingDrain),
}

impl MaterializationOutcome {
    pub fn is_applicable(&self) -> bool {
        !matches!(self, MaterializationOutcome::NotApplicable)
    }
}

impl std::fmt::Debug for MaterializationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaterializationOutcome::NotApplicable => f.write_str("NotApplicable"),
            MaterializationOutcome::CompletedSync(drained) => {
                f.debug_tuple("CompletedSync").field(drained).finish()
            }
            MaterializationOutcome::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// 单次排空的约束：请求取消标记与可选的元素数量上限。
#[derive(Clone, Debug, Default)]
pub struct DrainBudget {
    pub cancellation: Cancellation,
    pub max_elements: Option<usize>,
}

impl DrainBudget {
    pub fn new(cancellation: Cancellation) -> Self {
        Self {
            cancellation,
            max_elements: None,
        }
    }

    pub fn with_max_elements(mut self, limit: Option<usize>) -> Self {
        self.max_elements = limit;
        self
    }
}

/// 针对某个元素类型单态化的排空函数，对象安全形式。
///
/// # 契约说明（What）
/// - `start` 只做类型还原与取出底层流，不轮询；返回的 Future 完成后产出 `Vec<T>`；
/// - 实现必须无状态，可被多个请求并发共享。
pub trait SequenceDrain: Send + Sync + 'static {
    fn element_type(&self) -> TypeToken;

    fn list_type(&self) -> TypeToken;

    fn start(&self, value: &OutputValue, budget: DrainBudget) -> Result<PendingDrain, OutputError>;
}

/// 泛型层排空实现，经 [`SequenceDrain`] 装箱后进入缓存。
pub struct TypedSequenceDrain<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSequenceDrain<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedSequenceDrain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SequenceDrain for TypedSequenceDrain<T>
where
    T: Any + Send + Sync,
{
    fn element_type(&self) -> TypeToken {
        TypeToken::of::<T>()
    }

    fn list_type(&self) -> TypeToken {
        TypeToken::of::<Vec<T>>()
    }

    fn start(&self, value: &OutputValue, budget: DrainBudget) -> Result<PendingDrain, OutputError> {
        let sequence = value.downcast_ref::<AsyncSequence<T>>().ok_or_else(|| {
            OutputError::TypeMismatch {
                expected: type_name::<AsyncSequence<T>>(),
                found: value.type_token().name(),
            }
        })?;
        let stream = sequence
            .take_stream()
            .ok_or_else(|| OutputError::SequenceConsumed {
                element: type_name::<T>(),
            })?;
        Ok(Box::pin(drain_stream(stream, budget)))
    }
}

async fn drain_stream<T>(
    mut stream: BoxStream<'static, Result<T, BoxError>>,
    budget: DrainBudget,
) -> Result<Drained, OutputError>
where
    T: Any + Send + Sync,
{
    let mut items = Vec::new();
    let mut cancelled = budget.cancellation.cancelled();
    loop {
        // 取消优先：标记已置位时不再拉取下一个元素。
        let next = match future::select(&mut cancelled, stream.next()).await {
            Either::Left(((), _)) => return Err(OutputError::Cancelled),
            Either::Right((next, _)) => next,
        };
        let Some(next) = next else {
            break;
        };
        let item = next.map_err(|source| OutputError::Drain {
            element: type_name::<T>(),
            source,
        })?;
        if let Some(limit) = budget.max_elements
            && items.len() >= limit
        {
            return Err(OutputError::SequenceLimitExceeded { limit });
        }
        items.push(item);
    }
    Ok(Drained::from_list(OutputValue::new(items)))
}

/// 缓存条目：永久“不适用”标记或已构建的排空函数。
#[derive(Clone)]
enum CachedConverter {
    NotApplicable,
    Drain(Arc<dyn SequenceDrain>),
}

static GLOBAL: LazyLock<Arc<SequenceMaterializer>> =
    LazyLock::new(|| Arc::new(SequenceMaterializer::new()));

/// 异步序列物化器与其转换器缓存。
///
/// # 教案式说明
/// - **意图 (Why)**：把“类型探测 + 专用排空函数构建”的昂贵步骤限制为每个运行时类型一次；
/// - **契约 (What)**：
///   - [`SequenceMaterializer::global`] 返回进程级共享实例，生命周期覆盖整个进程；
///   - 也可单独构造实例，缓存彼此隔离；
///   - `cached_types`/`converter_builds` 暴露缓存规模与构建次数；
/// - **风险 (Trade-offs)**：构建在 `DashMap` 锁外进行，避免持有分片锁期间执行用户代码，代价是并发首访可能重复构建。
#[derive(Default)]
pub struct SequenceMaterializer {
    converters: DashMap<TypeId, CachedConverter>,
    builds: AtomicUsize,
}

impl SequenceMaterializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 进程级共享实例。
    pub fn global() -> Arc<SequenceMaterializer> {
        Arc::clone(&GLOBAL)
    }

    /// 判断并在需要时排空异步序列。
    ///
    /// # 执行逻辑（How）
    /// 1. 按运行时 `TypeId` 查缓存，未命中时依据类型令牌的序列探针构建条目并写入；
    /// 2. 不适用则直接返回 `NotApplicable`；
    /// 3. 适用则启动排空 Future，并以空唤醒器轮询一次：已就绪返回 `CompletedSync`，否则返回 `Pending`。
    pub fn materialize(
        &self,
        value: &OutputValue,
        budget: DrainBudget,
    ) -> Result<MaterializationOutcome, OutputError> {
        let converter = match self.converter_for(value.type_token()) {
            CachedConverter::NotApplicable => return Ok(MaterializationOutcome::NotApplicable),
            CachedConverter::Drain(converter) => converter,
        };

        let mut pending = converter.start(value, budget)?;
        let mut cx = Context::from_waker(noop_waker_ref());
        match pending.as_mut().poll(&mut cx) {
            Poll::Ready(Ok(drained)) => Ok(MaterializationOutcome::CompletedSync(drained)),
            Poll::Ready(Err(err)) => Err(err),
            Poll::Pending => Ok(MaterializationOutcome::Pending(pending)),
        }
    }

    /// 已缓存的运行时类型数量（含“不适用”标记）。
    pub fn cached_types(&self) -> usize {
        self.converters.len()
    }

    /// 转换器累计构建次数。
    pub fn converter_builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    fn converter_for(&self, token: TypeToken) -> CachedConverter {
        if let Some(cached) = self.converters.get(&token.id()) {
            return cached.value().clone();
        }

        let built = match token.sequence_probe() {
            Some(probe) => {
                let converter = (probe.build)();
                tracing::trace!(
                    target: "spark_output::materializer",
                    runtime_type = token.name(),
                    element_type = converter.element_type().name(),
                    "built async sequence converter"
                );
                CachedConverter::Drain(converter)
            }
            None => CachedConverter::NotApplicable,
        };
        self.builds.fetch_add(1, Ordering::Relaxed);
        self.converters.insert(token.id(), built.clone());
        built
    }
}

impl std::fmt::Debug for SequenceMaterializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceMaterializer")
            .field("cached_types", &self.cached_types())
            .field("converter_builds", &self.converter_builds())
            .finish()
    }
}
