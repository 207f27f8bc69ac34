//! Line-level parsing of the streaming protocol
//!
//! A streaming body is a sequence of `data: {json}` lines separated by blank
//! lines and closed by `data: [DONE]`. Lines that do not parse are skipped
//! rather than failing the stream; the caller counts them.

use serde_json::Value;

use crate::protocol::{WireChunk, WireUsage};
use crate::types::{FinishReason, Usage};

/// Terminal payload closing a stream
const DONE: &str = "[DONE]";

/// SSE fields other than `data` that carry nothing for a chat stream
const IGNORED_FIELDS: [&str; 3] = ["event:", "id:", "retry:"];

/// Result of parsing one line
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    /// Blank line, comment, or non-data field
    Skip,
    /// Payload was not valid chunk JSON
    Malformed(String),
    /// The `[DONE]` sentinel
    Done,
    /// A chunk carrying partial updates
    Chunk(Chunk),
    /// The gateway reported a failure in place of further chunks
    Error(StreamError),
}

/// Failure reported inside a streaming body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamError {
    /// Human-readable reason
    pub message: String,
    /// HTTP-style status code, when the gateway supplied one
    pub code: Option<u16>,
}

impl StreamError {
    fn from_value(error: Value) -> Self {
        let code = error.get("code").and_then(|code| match code {
            Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            Value::String(s) => s.parse().ok(),
            _ => None,
        });
        let message = match error {
            Value::String(message) => message,
            Value::Object(mut fields) => match fields.remove("message") {
                Some(Value::String(message)) => message,
                _ => Value::Object(fields).to_string(),
            },
            other => other.to_string(),
        };

        Self { message, code }
    }
}

/// Partial updates carried by one streaming line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    /// Response identifier
    pub id: Option<String>,
    /// Model name
    pub model: Option<String>,
    /// Text to append
    pub delta_text: Option<String>,
    /// Tool call fragments, in wire order
    pub tool_call_fragments: Vec<FragmentDelta>,
    /// Finish reason, on the last content chunk
    pub finish_reason: Option<FinishReason>,
    /// Usage totals, usually on the last chunk
    pub usage: Option<Usage>,
}

/// One tool call fragment within a chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentDelta {
    /// Position of the call, stable across the stream
    pub index: u32,
    /// Call identifier
    pub id: Option<String>,
    /// Function name
    pub name: Option<String>,
    /// Arguments fragment to append
    pub arguments: Option<String>,
}

/// Parse one line of a streaming response body
pub fn parse_line(line: &str) -> ParsedLine {
    let line = line.trim_end_matches(['\r', '\n']);

    if line.trim().is_empty() || line.starts_with(':') {
        return ParsedLine::Skip;
    }

    let payload = match line.strip_prefix("data:") {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
        None if IGNORED_FIELDS.iter().any(|f| line.starts_with(f)) => return ParsedLine::Skip,
        // Some gateways emit bare JSON lines instead of SSE
        None => line,
    };

    if payload.trim() == DONE {
        return ParsedLine::Done;
    }

    match serde_json::from_str::<WireChunk>(payload) {
        Ok(WireChunk { error: Some(error), .. }) => ParsedLine::Error(StreamError::from_value(error)),
        Ok(chunk) => ParsedLine::Chunk(chunk.into()),
        Err(e) => ParsedLine::Malformed(e.to_string()),
    }
}

impl From<WireChunk> for Chunk {
    fn from(chunk: WireChunk) -> Self {
        // Only the first choice is tracked; `n > 1` is not requested
        let choice = chunk.choices.into_iter().find(|c| c.index == 0);

        let (delta_text, tool_call_fragments, finish_reason) = match choice {
            Some(choice) => (
                choice.delta.content,
                choice
                    .delta
                    .tool_calls
                    .unwrap_or_default()
                    .into_iter()
                    .map(|tc| {
                        let (name, arguments) = tc.function.map_or((None, None), |f| (f.name, f.arguments));
                        FragmentDelta {
                            index: tc.index,
                            id: tc.id,
                            name,
                            arguments,
                        }
                    })
                    .collect(),
                choice.finish_reason.as_deref().map(FinishReason::parse),
            ),
            None => (None, Vec::new(), None),
        };

        Self {
            id: chunk.id,
            model: chunk.model,
            delta_text,
            tool_call_fragments,
            finish_reason,
            usage: chunk.usage.map(Into::into),
        }
    }
}

impl From<WireUsage> for Usage {
    fn from(usage: WireUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(line: &str) -> Chunk {
        match parse_line(line) {
            ParsedLine::Chunk(chunk) => chunk,
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(parse_line(""), ParsedLine::Skip);
        assert_eq!(parse_line("   \t"), ParsedLine::Skip);
        assert_eq!(parse_line("\r"), ParsedLine::Skip);
    }

    #[test]
    fn comments_and_other_fields_are_skipped() {
        assert_eq!(parse_line(": keep-alive"), ParsedLine::Skip);
        assert_eq!(parse_line("event: message"), ParsedLine::Skip);
        assert_eq!(parse_line("retry: 3000"), ParsedLine::Skip);
    }

    #[test]
    fn done_sentinel() {
        assert_eq!(parse_line("data: [DONE]"), ParsedLine::Done);
        assert_eq!(parse_line("data:[DONE]\r"), ParsedLine::Done);
    }

    #[test]
    fn malformed_json_is_reported_not_fatal() {
        assert!(matches!(parse_line("data: {\"choices\": ["), ParsedLine::Malformed(_)));
        assert!(matches!(parse_line("data: not json"), ParsedLine::Malformed(_)));
    }

    #[test]
    fn gateway_error_payload() {
        let line = r#"data: {"error":{"message":"rate limited","type":"throttling","code":429}}"#;
        assert_eq!(
            parse_line(line),
            ParsedLine::Error(StreamError {
                message: "rate limited".to_owned(),
                code: Some(429),
            })
        );
    }

    #[test]
    fn gateway_error_with_string_code_or_bare_message() {
        let ParsedLine::Error(err) = parse_line(r#"data: {"error":{"message":"boom","code":"503"}}"#) else {
            panic!("expected error");
        };
        assert_eq!(err.code, Some(503));

        let ParsedLine::Error(err) = parse_line(r#"data: {"error":"upstream went away"}"#) else {
            panic!("expected error");
        };
        assert_eq!(err.message, "upstream went away");
        assert_eq!(err.code, None);
    }

    #[test]
    fn null_error_field_is_a_normal_chunk() {
        let c = chunk(r#"data: {"error":null,"choices":[{"index":0,"delta":{"content":"ok"}}]}"#);
        assert_eq!(c.delta_text.as_deref(), Some("ok"));
    }

    #[test]
    fn content_delta() {
        let c = chunk(r#"data: {"id":"chatcmpl-1","model":"m","choices":[{"index":0,"delta":{"content":"Hel"}}]}"#);
        assert_eq!(c.id.as_deref(), Some("chatcmpl-1"));
        assert_eq!(c.delta_text.as_deref(), Some("Hel"));
        assert!(c.tool_call_fragments.is_empty());
        assert_eq!(c.finish_reason, None);
    }

    #[test]
    fn finish_reason_chunk() {
        let c = chunk(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#);
        assert_eq!(c.finish_reason, Some(FinishReason::Stop));
        assert_eq!(c.delta_text, None);
    }

    #[test]
    fn tool_call_fragments() {
        let c = chunk(
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","function":{"name":"search","arguments":""}},{"index":1,"function":{"arguments":"{\"q\""}}]}}]}"#,
        );
        assert_eq!(
            c.tool_call_fragments,
            vec![
                FragmentDelta {
                    index: 0,
                    id: Some("call_a".to_owned()),
                    name: Some("search".to_owned()),
                    arguments: Some(String::new()),
                },
                FragmentDelta {
                    index: 1,
                    id: None,
                    name: None,
                    arguments: Some("{\"q\"".to_owned()),
                },
            ]
        );
    }

    #[test]
    fn usage_only_chunk() {
        let c = chunk(r#"data: {"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#);
        assert_eq!(
            c.usage,
            Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15
            })
        );
    }

    #[test]
    fn bare_json_line_is_accepted() {
        let c = chunk(r#"{"choices":[{"delta":{"content":"x"}}]}"#);
        assert_eq!(c.delta_text.as_deref(), Some("x"));
    }

    #[test]
    fn unknown_finish_reason_is_kept() {
        let c = chunk(r#"data: {"choices":[{"delta":{},"finish_reason":"recitation"}]}"#);
        assert_eq!(c.finish_reason, Some(FinishReason::Other("recitation".to_owned())));
    }
}
