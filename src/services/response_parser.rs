use serde_json::Value;
use thiserror::Error;

use crate::models::StructuredSummary;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("The AI did not return valid JSON data: no JSON object found in the response")]
    NoJsonObject { raw_response: String },

    #[error("The AI did not return valid JSON data: {message}")]
    InvalidJson { message: String, raw_response: String },

    #[error("The AI returned JSON without the expected summary fields: {message}")]
    MissingFields { message: String, raw_response: String },
}

impl ParseError {
    /// The model reply that failed to parse.
    pub fn raw_response(&self) -> &str {
        match self {
            ParseError::NoJsonObject { raw_response }
            | ParseError::InvalidJson { raw_response, .. }
            | ParseError::MissingFields { raw_response, .. } => raw_response,
        }
    }
}

/// Turns a model reply into a JSON object.
pub trait ResponseParser: Send + Sync {
    fn parse(&self, content: &str) -> Result<Value, ParseError>;
}

/// Takes everything from the first `{` to the last `}` and decodes it
/// strictly. Prose before or after the object is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct BraceSpanParser;

impl ResponseParser for BraceSpanParser {
    fn parse(&self, content: &str) -> Result<Value, ParseError> {
        let span = match (content.find('{'), content.rfind('}')) {
            (Some(start), Some(end)) if start < end => &content[start..=end],
            _ => {
                return Err(ParseError::NoJsonObject {
                    raw_response: content.to_string(),
                })
            }
        };

        serde_json::from_str(span).map_err(|e| ParseError::InvalidJson {
            message: e.to_string(),
            raw_response: content.to_string(),
        })
    }
}

/// Parses `content` with `parser` and checks it carries every summary
/// field. Returns the object untouched together with its typed view.
pub fn parse_summary(
    parser: &dyn ResponseParser,
    content: &str,
) -> Result<(Value, StructuredSummary), ParseError> {
    let value = parser.parse(content)?;
    let summary = serde_json::from_value(value.clone()).map_err(|e| ParseError::MissingFields {
        message: e.to_string(),
        raw_response: content.to_string(),
    })?;
    Ok((value, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SUMMARY: &str = r####"{"name": "星河科技", "property": "股权", "status": "尚未开始", "industry": "协作机器人", "description": "该公司研发协作机器人", "aiSummary": "### 1. 核心痛点\n文件中未提及"}"####;

    #[test]
    fn tolerates_surrounding_prose() {
        let reply = format!("好的，以下是分析结果：\n{}\n希望对您有帮助。", SUMMARY);
        let value = BraceSpanParser.parse(&reply).unwrap();
        assert_eq!(value["name"], "星河科技");
    }

    #[test]
    fn nested_objects_use_outermost_braces() {
        let value = BraceSpanParser.parse("x {\"a\": {\"b\": 1}} y").unwrap();
        assert_eq!(value, json!({ "a": { "b": 1 } }));
    }

    #[test]
    fn reply_without_braces_is_no_json_object() {
        let err = BraceSpanParser.parse("抱歉，我无法完成该请求。").unwrap_err();
        assert!(matches!(err, ParseError::NoJsonObject { .. }));
        assert_eq!(err.raw_response(), "抱歉，我无法完成该请求。");
    }

    #[test]
    fn reversed_braces_are_no_json_object() {
        let err = BraceSpanParser.parse("} nothing here {").unwrap_err();
        assert!(matches!(err, ParseError::NoJsonObject { .. }));
    }

    #[test]
    fn malformed_json_keeps_raw_reply() {
        let reply = "{\"name\": \"x\", }";
        let err = BraceSpanParser.parse(reply).unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson { .. }));
        assert_eq!(err.raw_response(), reply);
    }

    #[test]
    fn summary_requires_all_fields() {
        let (value, summary) = parse_summary(&BraceSpanParser, SUMMARY).unwrap();
        assert_eq!(summary.property, "股权");
        assert_eq!(value, serde_json::from_str::<Value>(SUMMARY).unwrap());

        let err = parse_summary(&BraceSpanParser, "{\"name\": \"x\"}").unwrap_err();
        assert!(matches!(err, ParseError::MissingFields { .. }));
    }
}
