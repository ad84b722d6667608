//! # context 模块：请求级输出上下文
//!
//! ## 核心意图（Why）
//! - 汇总输出阶段需要的请求侧信息：已解析的 `Accept` 列表、响应可写面与取消标记；
//! - 取消语义参照调用上下文的取消原语：原子标记一旦置位即不可撤销，挂起中的排空与写出据此尽早退出。

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use futures::task::AtomicWaker;

use crate::media::{MediaType, parse_accept};
use crate::response::ResponseSink;

#[derive(Debug, Default)]
struct CancellationState {
    flag: AtomicBool,
    waker: AtomicWaker,
}

/// 请求取消标记。
///
/// # 契约说明（What）
/// - 克隆共享同一标记；
/// - [`Cancellation::cancel`] 首次置位返回 `true`，重复调用返回 `false`；
/// - 使用 `Release/Acquire` 保证取消前的写入对观察方可见；
/// - 置位时唤醒经 [`Cancellation::cancelled`] 挂起的等待方，使挂起中的排空无需等到下一个元素即可退出。
///
/// # 风险提示（Trade-offs）
/// - 唤醒槽只保存最近一次注册的唤醒器，同一时刻应只有一个任务等待 [`Cancelled`]。
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    state: Arc<CancellationState>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) -> bool {
        let first = self
            .state
            .flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.state.waker.wake();
        }
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.flag.load(Ordering::Acquire)
    }

    /// 返回在取消发生时完成的 Future。
    pub fn cancelled(&self) -> Cancelled {
        Cancelled {
            state: Arc::clone(&self.state),
        }
    }
}

/// [`Cancellation::cancelled`] 返回的 Future。
#[derive(Debug)]
pub struct Cancelled {
    state: Arc<CancellationState>,
}

impl Future for Cancelled {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.state.flag.load(Ordering::Acquire) {
            return Poll::Ready(());
        }
        self.state.waker.register(cx.waker());
        // 注册与置位之间可能发生取消，注册后需再次检查。
        if self.state.flag.load(Ordering::Acquire) {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

/// 单个请求的输出上下文。
///
/// # 教案式说明
/// - **意图 (Why)**：执行器、格式化器选择器与格式化器共享同一份请求视图，避免各自重复解析请求头；
/// - **契约 (What)**：
///   - `accept` 已按质量因子降序排序；为空表示请求未声明偏好；
///   - `response` 由宿主提供，生命周期覆盖整个输出阶段；
/// - **风险 (Trade-offs)**：上下文按请求创建，不跨请求复用。
#[derive(Clone)]
pub struct OutputContext {
    accept: Vec<MediaType>,
    response: Arc<dyn ResponseSink>,
    cancellation: Cancellation,
}

impl OutputContext {
    pub fn new(response: Arc<dyn ResponseSink>) -> Self {
        Self {
            accept: Vec::new(),
            response,
            cancellation: Cancellation::new(),
        }
    }

    /// 解析并挂载请求的 `Accept` 头。
    pub fn with_accept_header(mut self, header: &str) -> Self {
        self.accept = parse_accept(header);
        self
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn accept(&self) -> &[MediaType] {
        &self.accept
    }

    pub fn response(&self) -> &dyn ResponseSink {
        self.response.as_ref()
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }
}

impl std::fmt::Debug for OutputContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputContext")
            .field("accept", &self.accept)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::BufferedResponse;

    #[test]
    fn cancel_is_idempotent_and_shared() {
        let token = Cancellation::new();
        let observer = token.clone();
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(observer.is_cancelled());
    }

    #[test]
    fn cancelled_future_is_woken_by_cancel_from_another_thread() {
        let token = Cancellation::new();
        let remote = token.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(5));
            remote.cancel()
        });
        futures::executor::block_on(token.cancelled());
        assert!(canceller.join().unwrap());
        assert!(token.is_cancelled());
    }

    #[test]
    fn accept_header_is_parsed_once() {
        let ctx = OutputContext::new(Arc::new(BufferedResponse::new()))
            .with_accept_header("application/xml;q=0.4, application/json");
        let accepted: Vec<&str> = ctx.accept().iter().map(MediaType::essence).collect();
        assert_eq!(accepted, ["application/json", "application/xml"]);
    }
}
