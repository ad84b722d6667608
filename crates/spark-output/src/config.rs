//! # config 模块：输出阶段配置
//!
//! ## 核心意图（Why）
//! - 内容协商有两处策略开关（是否信任浏览器的 `*/*`、协商失败是否坚持 406），
//!   物化有一个资源约束（异步序列缓冲上限），统一收敛到 [`OutputOptions`]；
//! - 宿主通常从 TOML 配置段加载，缺省字段取默认值。
//!
//! ## 行为契约（What）
//! - `respect_browser_accept_header = false`：`Accept` 中出现 `*/*` 时忽略整个 `Accept`；
//! - `return_http_not_acceptable = false`：`Accept` 无法满足时回退到忽略 `Accept` 的选择；
//! - `max_sequence_buffer = None`：异步序列不限长度。

use serde::Deserialize;

use crate::error::OutputError;

/// 输出阶段配置。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputOptions {
    pub respect_browser_accept_header: bool,
    pub return_http_not_acceptable: bool,
    pub max_sequence_buffer: Option<usize>,
}

impl OutputOptions {
    /// 从 TOML 文本解析配置。
    pub fn from_toml_str(source: &str) -> Result<Self, OutputError> {
        Ok(toml::from_str(source)?)
    }

    pub fn with_respect_browser_accept_header(mut self, enabled: bool) -> Self {
        self.respect_browser_accept_header = enabled;
        self
    }

    pub fn with_return_http_not_acceptable(mut self, enabled: bool) -> Self {
        self.return_http_not_acceptable = enabled;
        self
    }

    pub fn with_max_sequence_buffer(mut self, limit: Option<usize>) -> Self {
        self.max_sequence_buffer = limit;
        self
    }
}
