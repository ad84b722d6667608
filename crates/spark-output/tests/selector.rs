//! 默认格式化器选择器集成测试
//!
//! - **核心目标 (Why)**：覆盖 `Accept`、候选内容类型与注册表三方合并时的选择顺序，
//!   以及两个策略开关对结果的影响；
//! - **设计手法 (How)**：选择器只做决策，用例直接构造协商上下文调用 `select`，不经过执行器。

use std::sync::Arc;

use spark_output::test_stubs::StubFormatter;
use spark_output::{
    BufferedResponse, DefaultFormatterSelector, MediaTypeCollection, OutputContext,
    OutputFormatterContext, OutputFormatterSelector, OutputOptions, TypeToken,
};

#[allow(dead_code)]
struct Invoice;

fn selector(options: OutputOptions, formatters: Vec<StubFormatter>) -> DefaultFormatterSelector {
    formatters
        .into_iter()
        .fold(DefaultFormatterSelector::new(options), |selector, stub| {
            selector.with_formatter(Arc::new(stub))
        })
}

/// 返回选中的 (格式化器名称, 内容类型)。
fn select(
    selector: &DefaultFormatterSelector,
    accept: Option<&str>,
    object_type: Option<TypeToken>,
    content_types: &[&'static str],
) -> Option<(String, String)> {
    let output = OutputContext::new(Arc::new(BufferedResponse::new()));
    let output = match accept {
        Some(header) => output.with_accept_header(header),
        None => output,
    };
    let content_types: MediaTypeCollection = content_types.iter().copied().collect();
    let ctx = OutputFormatterContext::new(&output, object_type, None, &content_types);
    selector
        .select(&ctx, &[], &content_types)
        .expect("注册表非空时选择不应失败")
        .map(|selection| {
            (
                selection.formatter.name().to_owned(),
                selection.content_type.to_string(),
            )
        })
}

fn json_and_xml(options: OutputOptions) -> DefaultFormatterSelector {
    selector(
        options,
        vec![
            StubFormatter::new("json", ["application/json", "text/json"]),
            StubFormatter::new("xml", ["application/xml"]),
        ],
    )
}

fn pair(name: &str, content_type: &str) -> Option<(String, String)> {
    Some((name.to_owned(), content_type.to_owned()))
}

#[test]
fn no_accept_picks_first_formatter_default() {
    let selector = json_and_xml(OutputOptions::default());
    assert_eq!(
        select(&selector, None, None, &[]),
        pair("json", "application/json")
    );
}

#[test]
fn accept_entries_are_tried_by_quality() {
    let selector = json_and_xml(OutputOptions::default());
    assert_eq!(
        select(
            &selector,
            Some("application/json;q=0.4, application/xml"),
            None,
            &[]
        ),
        pair("xml", "application/xml")
    );
}

#[test]
fn zero_quality_entries_are_refused() {
    let selector = json_and_xml(OutputOptions::default().with_return_http_not_acceptable(true));
    assert_eq!(
        select(&selector, Some("application/xml;q=0, text/json"), None, &[]),
        pair("json", "text/json")
    );
}

#[test]
fn subtype_wildcard_in_accept_resolves_to_supported_type() {
    let selector = json_and_xml(OutputOptions::default());
    assert_eq!(
        select(&selector, Some("text/*"), None, &[]),
        pair("json", "text/json")
    );
}

#[test]
fn specific_request_inside_supported_wildcard_is_echoed() {
    let selector = selector(
        OutputOptions::default(),
        vec![StubFormatter::new("json-family", ["application/*+json"])],
    );
    assert_eq!(
        select(&selector, Some("application/vnd.api+json"), None, &[]),
        pair("json-family", "application/vnd.api+json")
    );
}

#[test]
fn browser_wildcard_is_honoured_when_enabled() {
    let selector = json_and_xml(OutputOptions::default().with_respect_browser_accept_header(true));
    assert_eq!(
        select(&selector, Some("application/xml, */*;q=0.8"), None, &[]),
        pair("xml", "application/xml")
    );

    let lenient = json_and_xml(OutputOptions::default());
    assert_eq!(
        select(&lenient, Some("application/xml, */*;q=0.8"), None, &[]),
        pair("json", "application/json")
    );
}

#[test]
fn unsatisfied_accept_falls_back_unless_strict() {
    let lenient = json_and_xml(OutputOptions::default());
    assert_eq!(
        select(&lenient, Some("image/png"), None, &[]),
        pair("json", "application/json")
    );

    let strict = json_and_xml(OutputOptions::default().with_return_http_not_acceptable(true));
    assert_eq!(select(&strict, Some("image/png"), None, &[]), None);
}

#[test]
fn content_types_are_filtered_by_accept() {
    let selector = selector(
        OutputOptions::default(),
        vec![
            StubFormatter::new("csv", ["text/csv"]),
            StubFormatter::new("json", ["application/json"]),
        ],
    );
    assert_eq!(
        select(
            &selector,
            Some("application/json"),
            None,
            &["text/csv", "application/json"]
        ),
        pair("json", "application/json")
    );
}

#[test]
fn disjoint_accept_and_content_types_are_not_acceptable_when_strict() {
    let options = OutputOptions::default().with_return_http_not_acceptable(true);
    let selector = selector(options, vec![StubFormatter::new("csv", ["text/csv"])]);
    assert_eq!(
        select(&selector, Some("application/json"), None, &["text/csv"]),
        None
    );
}

#[test]
fn content_types_without_accept_follow_formatter_order() {
    let selector = json_and_xml(OutputOptions::default());
    assert_eq!(
        select(&selector, None, None, &["application/xml", "text/json"]),
        pair("json", "text/json")
    );
}

#[test]
fn formatters_rejecting_the_type_are_skipped() {
    let selector = DefaultFormatterSelector::new(OutputOptions::default())
        .with_formatter(Arc::new(
            StubFormatter::new("invoice-only", ["application/json"]).accepting::<Invoice>(),
        ))
        .with_formatter(Arc::new(StubFormatter::new("text", ["text/plain"])));

    assert_eq!(
        select(&selector, None, Some(TypeToken::of::<String>()), &[]),
        pair("text", "text/plain")
    );
    assert_eq!(
        select(&selector, None, Some(TypeToken::of::<Invoice>()), &[]),
        pair("invoice-only", "application/json")
    );
}
