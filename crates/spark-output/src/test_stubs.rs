//! 测试桩命名空间：可记录调用的格式化器与诊断出口。
//!
//! # 设计背景（Why）
//! - crate 自身的单元测试、集成测试以及下游宿主的集成测试都需要“可观察”的格式化器与诊断出口，
//!   集中维护可避免各处重复定义；
//! - 桩对象只依赖公开契约，契约演进时在此单点适配。

use std::any::Any;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::diagnostics::{DiagnosticSink, OutputEvent};
use crate::error::OutputError;
use crate::formatter::{OutputFormatter, OutputFormatterContext};
use crate::media::MediaType;
use crate::value::TypeToken;

type Renderer = Arc<dyn Fn(&OutputFormatterContext<'_>) -> Option<Bytes> + Send + Sync>;

/// 一次写出调用的快照。
#[derive(Clone, Debug, PartialEq)]
pub struct WriteRecord {
    pub object_type: Option<TypeToken>,
    pub content_type: Option<MediaType>,
}

/// 可配置的格式化器桩。
///
/// - 未调用 [`StubFormatter::accepting`] 时接受任意有效类型；
/// - 配置了渲染函数时把其输出写入正文；
/// - [`StubFormatter::failing`] 使写出返回 [`OutputError::Write`]。
pub struct StubFormatter {
    name: String,
    media_types: Vec<MediaType>,
    accepted_types: Option<Vec<TypeToken>>,
    renderer: Option<Renderer>,
    failure: Option<String>,
    writes: Mutex<Vec<WriteRecord>>,
}

impl StubFormatter {
    pub fn new<I, M>(name: impl Into<String>, media_types: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MediaType>,
    {
        Self {
            name: name.into(),
            media_types: media_types.into_iter().map(Into::into).collect(),
            accepted_types: None,
            renderer: None,
            failure: None,
            writes: Mutex::new(Vec::new()),
        }
    }

    /// 只接受类型 `T`，可多次调用叠加。
    pub fn accepting<T: Any>(mut self) -> Self {
        self.accepted_types
            .get_or_insert_with(Vec::new)
            .push(TypeToken::of::<T>());
        self
    }

    pub fn with_renderer(
        mut self,
        renderer: impl Fn(&OutputFormatterContext<'_>) -> Option<Bytes> + Send + Sync + 'static,
    ) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }
}

#[async_trait]
impl OutputFormatter for StubFormatter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_media_types(&self) -> &[MediaType] {
        &self.media_types
    }

    fn can_write_type(&self, object_type: Option<TypeToken>) -> bool {
        match &self.accepted_types {
            None => true,
            Some(accepted) => object_type.is_some_and(|token| accepted.contains(&token)),
        }
    }

    async fn write(&self, ctx: &OutputFormatterContext<'_>) -> Result<(), OutputError> {
        self.writes.lock().push(WriteRecord {
            object_type: ctx.object_type(),
            content_type: ctx.content_type().cloned(),
        });
        if let Some(message) = &self.failure {
            return Err(OutputError::write(
                self.name.clone(),
                io::Error::other(message.clone()),
            ));
        }
        if let Some(content_type) = ctx.content_type() {
            ctx.response().set_content_type(content_type.as_str());
        }
        if let Some(body) = self.renderer.as_ref().and_then(|render| render(ctx)) {
            ctx.response().write_body(body);
        }
        Ok(())
    }
}

/// 诊断事件的拥有型快照。
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedEvent {
    pub name: &'static str,
    pub object_type: Option<TypeToken>,
    pub formatter: Option<String>,
    pub content_type: Option<String>,
    pub content_types: Vec<String>,
}

/// 把事件保存在内存中的诊断出口。
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    /// 指定名称的事件数量。
    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| event.name == name)
            .count()
    }
}

impl DiagnosticSink for RecordingDiagnostics {
    fn emit(&self, event: &OutputEvent<'_>) {
        let recorded = match event {
            OutputEvent::NoFormatterFound {
                object_type,
                content_types,
            } => RecordedEvent {
                name: event.name(),
                object_type: *object_type,
                formatter: None,
                content_type: None,
                content_types: content_types.iter().map(ToString::to_string).collect(),
            },
            OutputEvent::FormatterSelected {
                formatter,
                content_type,
                object_type,
            } => RecordedEvent {
                name: event.name(),
                object_type: *object_type,
                formatter: Some((*formatter).to_owned()),
                content_type: Some(content_type.to_string()),
                content_types: Vec::new(),
            },
        };
        self.events.lock().push(recorded);
    }
}
