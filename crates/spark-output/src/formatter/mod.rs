//! # formatter 模块：格式化器与选择器契约
//!
//! ## 设计定位（Why）
//! - 具体的 JSON/XML 等写出器位于本 crate 之外，输出阶段只消费两项能力：
//!   “为 (类型, 值, 候选内容类型) 选出一个格式化器”与“用选中的格式化器写出”；
//! - [`OutputFormatterContext`] 是两项能力共享的协商上下文，执行器在物化完成后构造，
//!   选择完成后补记选中的内容类型再交给格式化器。
//!
//! ## 契约边界（What）
//! - 格式化器须满足 `Send + Sync + 'static`，以 `Arc<dyn OutputFormatter>` 形式在注册表与结果间共享；
//! - 写出失败由格式化器构造 [`OutputError::Write`]，执行器原样透传。

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::OutputContext;
use crate::error::OutputError;
use crate::media::{MediaType, MediaTypeCollection};
use crate::response::ResponseSink;
use crate::value::{OutputValue, TypeToken};

pub mod selector;

pub use selector::DefaultFormatterSelector;

/// 协商上下文：有效类型、有效值、候选内容类型与写出目标。
///
/// # 契约说明（What）
/// - `object_type`/`object` 为物化之后的有效对；值缺失时二者均可能为 `None`；
/// - `content_type` 在选择完成前为 `None`，写出时为选中的具体媒体类型。
pub struct OutputFormatterContext<'a> {
    output: &'a OutputContext,
    object_type: Option<TypeToken>,
    object: Option<&'a OutputValue>,
    content_types: &'a MediaTypeCollection,
    content_type: Option<MediaType>,
}

impl<'a> OutputFormatterContext<'a> {
    pub fn new(
        output: &'a OutputContext,
        object_type: Option<TypeToken>,
        object: Option<&'a OutputValue>,
        content_types: &'a MediaTypeCollection,
    ) -> Self {
        Self {
            output,
            object_type,
            object,
            content_types,
            content_type: None,
        }
    }

    pub fn output(&self) -> &'a OutputContext {
        self.output
    }

    pub fn response(&self) -> &'a dyn ResponseSink {
        self.output.response()
    }

    pub fn object_type(&self) -> Option<TypeToken> {
        self.object_type
    }

    pub fn object(&self) -> Option<&'a OutputValue> {
        self.object
    }

    /// 以具体类型借出有效值。
    pub fn object_as<T: Any>(&self) -> Option<&'a T> {
        self.object.and_then(|value| value.downcast_ref::<T>())
    }

    pub fn content_types(&self) -> &'a MediaTypeCollection {
        self.content_types
    }

    /// 选中的内容类型。
    pub fn content_type(&self) -> Option<&MediaType> {
        self.content_type.as_ref()
    }

    pub(crate) fn set_content_type(&mut self, content_type: MediaType) {
        self.content_type = Some(content_type);
    }
}

impl fmt::Debug for OutputFormatterContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputFormatterContext")
            .field("object_type", &self.object_type)
            .field("content_types", &self.content_types)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// 输出格式化器。
///
/// # 教案式说明
/// - **意图 (Why)**：以对象安全的异步 trait 表达写出器，使注册表可以混合存放不同实现；
/// - **契约 (What)**：
///   - `supported_media_types` 按偏好排序，首项为无指定内容类型时的默认输出；
///   - `can_write_type` 仅根据有效类型判断能否处理；
///   - `can_write_result` 返回实际将写出的媒体类型，`None` 表示拒绝；
///   - `write` 负责写入正文与相关头部；
/// - **风险 (Trade-offs)**：默认 `can_write_result` 不检查值本身，需要按值判断的实现应覆盖该方法。
#[async_trait]
pub trait OutputFormatter: Send + Sync + 'static {
    /// 诊断用名称。
    fn name(&self) -> &str;

    fn supported_media_types(&self) -> &[MediaType];

    fn can_write_type(&self, object_type: Option<TypeToken>) -> bool;

    /// 判断能否以 `content_type` 写出当前结果。
    ///
    /// # 执行逻辑（How）
    /// 1. 类型不被接受时返回 `None`；
    /// 2. 未指定内容类型时返回首个支持的媒体类型；
    /// 3. 指定内容类型（可含通配）时，返回首个属于该集合的支持类型；
    ///    若请求类型本身更具体且落在某个支持的通配类型中，返回请求类型。
    fn can_write_result(
        &self,
        ctx: &OutputFormatterContext<'_>,
        content_type: Option<&MediaType>,
    ) -> Option<MediaType> {
        if !self.can_write_type(ctx.object_type()) {
            return None;
        }
        let supported = self.supported_media_types();
        let Some(requested) = content_type else {
            return supported.first().cloned();
        };
        supported
            .iter()
            .find(|media| media.is_subset_of(requested))
            .cloned()
            .or_else(|| {
                supported
                    .iter()
                    .any(|media| requested.is_subset_of(media))
                    .then(|| requested.clone())
            })
    }

    async fn write(&self, ctx: &OutputFormatterContext<'_>) -> Result<(), OutputError>;
}

/// 选择结果：格式化器与其将写出的内容类型。
#[derive(Clone)]
pub struct FormatterSelection {
    pub formatter: Arc<dyn OutputFormatter>,
    pub content_type: MediaType,
}

impl fmt::Debug for FormatterSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatterSelection")
            .field("formatter", &self.formatter.name())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// 格式化器选择能力。
///
/// # 契约说明（What）
/// - `candidates` 为结果自带的覆盖列表；为空表示使用实现方持有的全局注册表；
/// - `content_types` 为内容类型解析后的候选集合，可能为空；
/// - 返回 `Ok(None)` 表示没有可接受的表示形式，由执行器转换为 406；
/// - 返回 `Err` 仅用于前置条件类故障（例如完全没有可用的格式化器）。
pub trait OutputFormatterSelector: Send + Sync {
    fn select(
        &self,
        ctx: &OutputFormatterContext<'_>,
        candidates: &[Arc<dyn OutputFormatter>],
        content_types: &MediaTypeCollection,
    ) -> Result<Option<FormatterSelection>, OutputError>;
}
