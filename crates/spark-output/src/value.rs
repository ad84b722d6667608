//! # value 模块：类型令牌与类型擦除的结果值
//!
//! ## 核心意图（Why）
//! - 应用逻辑返回的值形态各异：普通对象、尚未产出完毕的异步序列；输出阶段需要一个统一的
//!   “运行时类型 + 值”载体，才能在协商与写出之间传递；
//! - Rust 没有运行时反射，因此 [`TypeToken`] 在构造时就携带“是否为异步序列”的能力探针，
//!   物化器据此按 `TypeId` 一次性构建并缓存专用的排空函数。
//!
//! ## 行为契约（What）
//! - [`TypeToken::of`] 描述普通类型；[`TypeToken::any`] 是“未声明类型”的通配标记；
//! - 异步序列只能通过 [`OutputValue::sequence`]/[`OutputValue::try_sequence`] 构造，
//!   保证其令牌一定携带序列探针；
//! - [`OutputValue`] 要求 `Send + Sync + 'static`，格式化器可在异步写出期间借用。

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use futures::stream::{self, BoxStream, Stream, StreamExt};
use parking_lot::Mutex;

use crate::error::BoxError;
use crate::materializer::{SequenceDrain, TypedSequenceDrain};

/// 运行时类型的稳定标识。
///
/// # 设计背景（Why）
/// - 以 `TypeId` 作为缓存键，`type_name` 仅用于日志与诊断；
/// - `shape` 记录类型的结构能力：通配、普通类型或“元素类型为 T 的异步序列”。
///
/// # 契约说明（What）
/// - 相等性与哈希只比较 `TypeId`；
/// - 令牌可廉价复制，适合放入诊断事件或协商上下文。
#[derive(Clone, Copy)]
pub struct TypeToken {
    id: TypeId,
    name: &'static str,
    shape: TypeShape,
}

#[derive(Clone, Copy)]
enum TypeShape {
    Any,
    Plain,
    Sequence(SequenceProbe),
}

/// 异步序列能力探针：元素类型令牌与排空函数构造器，均为单态化后的函数指针。
#[derive(Clone, Copy)]
pub(crate) struct SequenceProbe {
    pub(crate) element: fn() -> TypeToken,
    pub(crate) build: fn() -> Arc<dyn SequenceDrain>,
}

struct AnyMarker;

impl TypeToken {
    /// 普通类型的令牌。
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            shape: TypeShape::Plain,
        }
    }

    /// “任意类型”通配标记，声明类型为该值时等价于未声明。
    pub fn any() -> Self {
        Self {
            id: TypeId::of::<AnyMarker>(),
            name: "any",
            shape: TypeShape::Any,
        }
    }

    pub(crate) fn sequence_of<T>() -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            id: TypeId::of::<AsyncSequence<T>>(),
            name: type_name::<AsyncSequence<T>>(),
            shape: TypeShape::Sequence(SequenceProbe {
                element: TypeToken::of::<T>,
                build: build_sequence_drain::<T>,
            }),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_any(&self) -> bool {
        matches!(self.shape, TypeShape::Any)
    }

    /// 若该类型为异步序列，返回元素类型。
    pub fn sequence_element(&self) -> Option<TypeToken> {
        self.sequence_probe().map(|probe| (probe.element)())
    }

    /// 该令牌是否描述类型 `T`。
    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    pub(crate) fn sequence_probe(&self) -> Option<SequenceProbe> {
        match self.shape {
            TypeShape::Sequence(probe) => Some(probe),
            TypeShape::Any | TypeShape::Plain => None,
        }
    }
}

fn build_sequence_drain<T>() -> Arc<dyn SequenceDrain>
where
    T: Any + Send + Sync,
{
    Arc::new(TypedSequenceDrain::<T>::new())
}

impl PartialEq for TypeToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeToken {}

impl Hash for TypeToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeToken").field(&self.name).finish()
    }
}

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 类型擦除的结果值。
///
/// # 契约说明（What）
/// - 构造时记录具体运行时类型的 [`TypeToken`]；
/// - `downcast_ref`/`downcast_mut` 用于格式化器与执行器还原具体类型。
pub struct OutputValue {
    token: TypeToken,
    inner: Box<dyn Any + Send + Sync>,
}

impl OutputValue {
    /// 包装普通值。
    pub fn new<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            token: TypeToken::of::<T>(),
            inner: Box::new(value),
        }
    }

    /// 包装一个不会失败的异步序列。
    pub fn sequence<T, S>(items: S) -> Self
    where
        T: Any + Send + Sync,
        S: Stream<Item = T> + Send + 'static,
    {
        Self::from_sequence(AsyncSequence::new(items.map(Ok).boxed()))
    }

    /// 包装一个可能在生产过程中失败的异步序列。
    pub fn try_sequence<T, E, S>(items: S) -> Self
    where
        T: Any + Send + Sync,
        E: Into<BoxError>,
        S: Stream<Item = Result<T, E>> + Send + 'static,
    {
        Self::from_sequence(AsyncSequence::new(
            items.map(|item| item.map_err(Into::into)).boxed(),
        ))
    }

    /// 以已缓冲的元素构造异步序列，排空可同步完成。
    pub fn buffered_sequence<T, I>(items: I) -> Self
    where
        T: Any + Send + Sync,
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self::sequence(stream::iter(items))
    }

    fn from_sequence<T>(sequence: AsyncSequence<T>) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            token: TypeToken::sequence_of::<T>(),
            inner: Box::new(sequence),
        }
    }

    /// 运行时具体类型。
    pub fn type_token(&self) -> TypeToken {
        self.token
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.inner.downcast_mut::<T>()
    }
}

impl fmt::Debug for OutputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputValue")
            .field("type", &self.token)
            .finish_non_exhaustive()
    }
}

/// 元素类型为 `T` 的惰性异步序列。
///
/// # 契约说明（What）
/// - 只能被排空一次；[`AsyncSequence::take_stream`] 之后再次获取返回 `None`；
/// - 内部以互斥锁包裹流，使序列满足 `Sync`，可随 [`OutputValue`] 在线程间共享引用。
pub struct AsyncSequence<T> {
    stream: Mutex<Option<BoxStream<'static, Result<T, BoxError>>>>,
}

impl<T> AsyncSequence<T> {
    fn new(stream: BoxStream<'static, Result<T, BoxError>>) -> Self {
        Self {
            stream: Mutex::new(Some(stream)),
        }
    }

    /// 取走底层流。
    pub fn take_stream(&self) -> Option<BoxStream<'static, Result<T, BoxError>>> {
        self.stream.lock().take()
    }

    /// 底层流是否已被取走。
    pub fn is_consumed(&self) -> bool {
        self.stream.lock().is_none()
    }
}

impl<T> fmt::Debug for AsyncSequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncSequence")
            .field("element", &type_name::<T>())
            .field("consumed", &self.is_consumed())
            .finish()
    }
}
