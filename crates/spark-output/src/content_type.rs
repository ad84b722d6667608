//! # ContentTypeResolver：候选内容类型推断
//!
//! ## 行为契约（What）
//! 依次尝试，首个命中者生效：
//! 1. 结果已显式携带内容类型：不做任何修改；
//! 2. 响应已被上游写入非空 Content-Type：将其作为唯一候选；
//! 3. 值为问题详情形态：依序加入 `application/problem+json`、`application/problem+xml`；
//! 4. 其余情况保持为空，由选择器按自身默认策略协商。
//!
//! 解析只追加、不删除，且必须在协商之前完成。

use crate::media::MediaType;
use crate::problem::is_problem_details;
use crate::result::ObjectResult;

/// 候选内容类型解析器。
#[derive(Clone, Copy, Debug, Default)]
pub struct ContentTypeResolver;

impl ContentTypeResolver {
    pub fn resolve(result: &mut ObjectResult, response_content_type: Option<&str>) {
        if !result.content_types().is_empty() {
            return;
        }

        if let Some(existing) = response_content_type
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            result
                .content_types_mut()
                .insert(MediaType::new(existing.to_owned()));
            return;
        }

        if result.value().is_some_and(is_problem_details) {
            let content_types = result.content_types_mut();
            content_types.insert(MediaType::PROBLEM_JSON);
            content_types.insert(MediaType::PROBLEM_XML);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{ProblemDetails, ValidationProblemDetails};
    use crate::value::OutputValue;

    fn rendered(result: &ObjectResult) -> Vec<&str> {
        result.content_types().iter().map(MediaType::as_str).collect()
    }

    #[test]
    fn explicit_content_type_is_left_untouched() {
        let mut result = ObjectResult::new(OutputValue::new(ProblemDetails::default()))
            .with_content_type("application/x");
        ContentTypeResolver::resolve(&mut result, Some("application/y"));
        assert_eq!(rendered(&result), ["application/x"]);
    }

    #[test]
    fn upstream_content_type_is_adopted_alone() {
        let mut result = ObjectResult::new(OutputValue::new(ProblemDetails::default()));
        ContentTypeResolver::resolve(&mut result, Some("application/y"));
        assert_eq!(rendered(&result), ["application/y"]);
    }

    #[test]
    fn blank_upstream_content_type_is_ignored() {
        let mut result = ObjectResult::new(OutputValue::new(1_i32));
        ContentTypeResolver::resolve(&mut result, Some("   "));
        assert!(result.content_types().is_empty());
    }

    #[test]
    fn problem_details_get_problem_media_types_in_order() {
        let mut result = ObjectResult::new(OutputValue::new(ValidationProblemDetails::default()));
        ContentTypeResolver::resolve(&mut result, None);
        assert_eq!(
            rendered(&result),
            ["application/problem+json", "application/problem+xml"]
        );
    }

    #[test]
    fn plain_values_negotiate_freely() {
        let mut result = ObjectResult::new(OutputValue::new("text".to_owned()));
        ContentTypeResolver::resolve(&mut result, None);
        assert!(result.content_types().is_empty());

        let mut empty = ObjectResult::empty();
        ContentTypeResolver::resolve(&mut empty, None);
        assert!(empty.content_types().is_empty());
    }
}
