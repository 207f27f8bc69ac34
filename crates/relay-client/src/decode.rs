//! Final response assembly
//!
//! Both the non-streaming body and a finished stream end up here, so a
//! completed tool call looks the same whichever path produced it.

use crate::accumulate::{StreamState, ToolCallFragment, assistant_message};
use crate::error::{GatewayError, Result};
use crate::protocol::{WireCompletion, WireEmbedResponse};
use crate::types::{ChatResponse, EmbedResponse, FinishReason, ToolCall, Usage};

/// Decode a non-streaming chat completion body
///
/// # Errors
///
/// Returns `GatewayError::Decode` if the body is not a completion object
/// with at least one choice, or `GatewayError::ToolCallDecode` if a tool
/// call is incomplete
pub fn decode_completion(body: &str) -> Result<ChatResponse> {
    let completion: WireCompletion =
        serde_json::from_str(body).map_err(|e| GatewayError::Decode(format!("invalid completion body: {e}")))?;

    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::Decode("completion has no choices".to_owned()))?;

    let calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .zip(0u32..)
        .map(|(tc, index)| {
            complete_tool_call(ToolCallFragment {
                index,
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ChatResponse {
        id: completion.id,
        model: completion.model,
        message: assistant_message(choice.message.content.as_deref().unwrap_or_default(), calls),
        usage: completion.usage.map(Usage::from).unwrap_or_default(),
        finish_reason: choice.finish_reason.as_deref().map(FinishReason::parse),
        is_final: true,
    })
}

/// Turn a finished stream into the final response
///
/// # Errors
///
/// Returns `GatewayError::ToolCallDecode` for the first tool call whose
/// name is missing or whose arguments are not valid JSON
pub fn finalize(state: StreamState) -> Result<ChatResponse> {
    let parts = state.into_parts();

    if parts.dropped_lines > 0 {
        tracing::warn!(
            dropped_lines = parts.dropped_lines,
            "stream finished with unparseable lines skipped"
        );
    }

    let calls = parts
        .fragments
        .into_iter()
        .map(complete_tool_call)
        .collect::<Result<Vec<_>>>()?;

    Ok(ChatResponse {
        id: parts.id,
        model: parts.model,
        message: assistant_message(&parts.text, calls),
        usage: parts.usage.unwrap_or_default(),
        finish_reason: parts.finish_reason,
        is_final: true,
    })
}

/// Decode an embeddings body; no data yields an empty vector
///
/// # Errors
///
/// Returns `GatewayError::Decode` if the body is not valid JSON
pub fn decode_embedding(body: &str) -> Result<EmbedResponse> {
    let response: WireEmbedResponse =
        serde_json::from_str(body).map_err(|e| GatewayError::Decode(format!("invalid embedding body: {e}")))?;

    Ok(EmbedResponse {
        embedding: response.data.into_iter().next().map(|d| d.embedding).unwrap_or_default(),
    })
}

fn complete_tool_call(fragment: ToolCallFragment) -> Result<ToolCall> {
    let index = fragment.index;

    let name = fragment
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| GatewayError::ToolCallDecode {
            index,
            reason: "missing function name".to_owned(),
        })?;

    // Zero-argument functions are streamed with no argument fragments at all
    let arguments = if fragment.arguments.trim().is_empty() {
        "{}".to_owned()
    } else {
        fragment.arguments
    };

    if let Err(e) = serde_json::from_str::<serde_json::Value>(&arguments) {
        return Err(GatewayError::ToolCallDecode {
            index,
            reason: format!("arguments are not valid JSON: {e}"),
        });
    }

    Ok(ToolCall {
        id: fragment.id,
        name,
        arguments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::parse::{Chunk, FragmentDelta};
    use crate::types::ContentPart;

    fn state_with_call(name: Option<&str>, arguments: &str) -> StreamState {
        let mut state = StreamState::default();
        state.merge(Chunk {
            tool_call_fragments: vec![FragmentDelta {
                index: 0,
                id: Some("call_1".to_owned()),
                name: name.map(str::to_owned),
                arguments: Some(arguments.to_owned()),
            }],
            ..Chunk::default()
        });
        state
    }

    #[test]
    fn completion_with_text_and_usage() {
        let body = r#"{
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
        }"#;

        let response = decode_completion(body).unwrap();
        assert_eq!(response.text(), "hi");
        assert_eq!(response.usage.total_tokens, 2);
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
        assert!(response.is_final);
    }

    #[test]
    fn completion_without_usage_reports_zero() {
        let body = r#"{"choices": [{"message": {"content": "ok"}}]}"#;
        assert_eq!(decode_completion(body).unwrap().usage, Usage::default());
    }

    #[test]
    fn completion_with_tool_calls() {
        let body = r#"{"choices": [{"message": {"content": null, "tool_calls": [
            {"id": "call_9", "type": "function", "function": {"name": "lookup", "arguments": "{\"id\":7}"}}
        ]}, "finish_reason": "tool_calls"}]}"#;

        let response = decode_completion(body).unwrap();
        assert!(response.message.content.iter().all(|p| matches!(p, ContentPart::ToolCall(_))));
        let call = response.tool_calls()[0];
        assert_eq!(call.id.as_deref(), Some("call_9"));
        assert_eq!(call.parsed_arguments().unwrap()["id"], 7);
    }

    #[test]
    fn completion_without_choices_is_a_decode_error() {
        let err = decode_completion(r#"{"choices": []}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(decode_completion("<html>").unwrap_err().kind(), ErrorKind::Decode);
    }

    #[test]
    fn finalize_parses_complete_arguments() {
        let response = finalize(state_with_call(Some("search"), r#"{"q":"rust"}"#)).unwrap();
        assert!(response.is_final);
        assert_eq!(response.tool_calls()[0].parsed_arguments().unwrap()["q"], "rust");
    }

    #[test]
    fn empty_arguments_become_an_empty_object() {
        let response = finalize(state_with_call(Some("now"), "")).unwrap();
        assert_eq!(response.tool_calls()[0].arguments, "{}");
    }

    #[test]
    fn truncated_arguments_fail_finalize() {
        let err = finalize(state_with_call(Some("search"), r#"{"q":"ru"#)).unwrap_err();
        assert!(matches!(err, GatewayError::ToolCallDecode { index: 0, .. }));
    }

    #[test]
    fn missing_name_fails_finalize() {
        let err = finalize(state_with_call(None, "{}")).unwrap_err();
        assert!(err.to_string().contains("missing function name"));
    }

    #[test]
    fn finalize_empty_stream() {
        let response = finalize(StreamState::default()).unwrap();
        assert!(response.message.content.is_empty());
        assert_eq!(response.usage, Usage::default());
        assert_eq!(response.finish_reason, None);
    }

    #[test]
    fn embedding_first_entry() {
        let body = r#"{"object": "list", "data": [{"embedding": [0.1, 0.2, 0.3], "index": 0}]}"#;
        assert_eq!(decode_embedding(body).unwrap().embedding, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn embedding_without_data_is_empty() {
        assert!(decode_embedding(r#"{"data": []}"#).unwrap().embedding.is_empty());
    }
}
