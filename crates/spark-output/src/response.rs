//! # response 模块：出站响应的最小可写面
//!
//! ## 核心意图（Why）
//! - 输出阶段只需要读取“上游是否已设置 Content-Type”、写入状态码，格式化器则需要追加头部与正文；
//!   以 [`ResponseSink`] 抽象这组能力，宿主可桥接到任意 HTTP 实现；
//! - [`BufferedResponse`] 是进程内实现，供测试与非流式宿主使用。
//!
//! ## 行为契约（What）
//! - 所有方法接收 `&self`，实现方负责内部同步；
//! - 执行器只会写入两类状态：协商失败时的 406，以及结果自身声明的状态码。

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;

/// 协商失败时使用的状态码。
pub const STATUS_NOT_ACCEPTABLE: u16 = 406;

/// 出站响应的可写面。
pub trait ResponseSink: Send + Sync {
    /// 上游阶段已经写入的 Content-Type。
    fn content_type(&self) -> Option<String>;

    fn set_content_type(&self, value: &str);

    fn status(&self) -> Option<u16>;

    fn set_status(&self, status: u16);

    /// 设置（覆盖）一个响应头。
    fn set_header(&self, name: &str, value: &str);

    /// 追加正文字节。
    fn write_body(&self, chunk: Bytes);
}

#[derive(Debug, Default)]
struct BufferedState {
    status: Option<u16>,
    content_type: Option<String>,
    headers: Vec<(String, String)>,
    body: BytesMut,
}

/// 把响应完整缓存在内存中的 [`ResponseSink`] 实现。
#[derive(Debug, Default)]
pub struct BufferedResponse {
    state: Mutex<BufferedState>,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟上游中间件已写入 Content-Type 的响应。
    pub fn with_content_type(value: impl Into<String>) -> Self {
        let response = Self::default();
        response.state.lock().content_type = Some(value.into());
        response
    }

    /// 按名称读取响应头，名称大小写不敏感。
    pub fn header(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    /// 当前正文的快照。
    pub fn body(&self) -> Bytes {
        Bytes::copy_from_slice(&self.state.lock().body)
    }

    pub fn body_len(&self) -> usize {
        self.state.lock().body.len()
    }
}

impl ResponseSink for BufferedResponse {
    fn content_type(&self) -> Option<String> {
        self.state.lock().content_type.clone()
    }

    fn set_content_type(&self, value: &str) {
        self.state.lock().content_type = Some(value.to_owned());
    }

    fn status(&self) -> Option<u16> {
        self.state.lock().status
    }

    fn set_status(&self, status: u16) {
        self.state.lock().status = Some(status);
    }

    fn set_header(&self, name: &str, value: &str) {
        let mut state = self.state.lock();
        let existing = state
            .headers
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name));
        match existing {
            Some(index) => state.headers[index].1 = value.to_owned(),
            None => state.headers.push((name.to_owned(), value.to_owned())),
        }
    }

    fn write_body(&self, chunk: Bytes) {
        self.state.lock().body.extend_from_slice(&chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_overwritten_case_insensitively() {
        let response = BufferedResponse::new();
        response.set_header("X-Trace", "a");
        response.set_header("x-trace", "b");
        assert_eq!(response.header("X-TRACE").as_deref(), Some("b"));
    }

    #[test]
    fn body_chunks_are_appended_in_order() {
        let response = BufferedResponse::with_content_type("text/plain");
        response.write_body(Bytes::from_static(b"hello "));
        response.write_body(Bytes::from_static(b"world"));
        assert_eq!(response.body(), Bytes::from_static(b"hello world"));
        assert_eq!(response.content_type().as_deref(), Some("text/plain"));
        assert_eq!(response.status(), None);
    }
}
