//! Chat request to wire JSON

use serde_json::Value;

use crate::error::{GatewayError, Result};
use crate::protocol::{WireContent, WireContentPart, WireFunctionCall, WireMessage, WireRequest, WireToolCall};
use crate::types::{ChatRequest, ContentPart, Message};

/// Top-level keys owned by the encoder
const RESERVED_KEYS: [&str; 5] = ["model", "messages", "stream", "tools", "tool_choice"];

/// Encode a chat request into the gateway's JSON body
///
/// # Errors
///
/// Returns `GatewayError::Encoding` if the model id is empty, there are no
/// messages, or a parameter tries to set a reserved key
pub fn encode_chat(request: &ChatRequest, stream: bool) -> Result<Value> {
    if request.model().trim().is_empty() {
        return Err(GatewayError::Encoding("model id is required".to_owned()));
    }
    if request.messages().is_empty() {
        return Err(GatewayError::Encoding("at least one message is required".to_owned()));
    }
    if let Some(key) = RESERVED_KEYS.iter().find(|k| request.params().contains_key(**k)) {
        return Err(GatewayError::Encoding(format!("parameter `{key}` is reserved")));
    }
    if request.tool_choice().is_some() && request.tools().is_none_or(<[_]>::is_empty) {
        return Err(GatewayError::Encoding("tool_choice requires at least one tool".to_owned()));
    }

    let wire = WireRequest {
        model: request.model(),
        messages: request.messages().iter().map(encode_message).collect(),
        stream,
        tools: request.tools().filter(|t| !t.is_empty()),
        tool_choice: request.tool_choice(),
        params: request.params(),
    };

    serde_json::to_value(&wire).map_err(|e| GatewayError::Encoding(e.to_string()))
}

fn encode_message(message: &Message) -> WireMessage {
    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();
    let mut tool_call_id = None;

    for part in &message.content {
        match part {
            ContentPart::Text { text } => texts.push(text.clone()),
            ContentPart::ToolCall(call) => tool_calls.push(WireToolCall {
                id: call.id.clone(),
                tool_type: "function".to_owned(),
                function: WireFunctionCall {
                    name: Some(call.name.clone()),
                    arguments: call.arguments.clone(),
                },
            }),
            ContentPart::ToolResult {
                tool_call_id: id,
                content,
            } => {
                tool_call_id.get_or_insert_with(|| id.clone());
                texts.push(content.clone());
            }
        }
    }

    // A lone text part goes out as a plain string, which every gateway accepts
    let content = match texts.len() {
        0 if !tool_calls.is_empty() => None,
        0 => Some(WireContent::Text(String::new())),
        1 => texts.pop().map(WireContent::Text),
        _ => Some(WireContent::Parts(
            texts.into_iter().map(|text| WireContentPart::Text { text }).collect(),
        )),
    };

    WireMessage {
        role: message.role.as_str(),
        content,
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        tool_call_id,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{ToolCall, ToolDefinition};

    fn hello() -> ChatRequest {
        ChatRequest::builder("m").message(Message::user("hi")).build()
    }

    #[test]
    fn minimal_request() {
        let body = encode_chat(&hello(), false).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "m",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": false
            })
        );
    }

    #[test]
    fn stream_flag_follows_mode() {
        assert_eq!(encode_chat(&hello(), true).unwrap()["stream"], true);
    }

    #[test]
    fn params_are_merged_at_top_level() {
        let request = ChatRequest::builder("m")
            .message(Message::user("hi"))
            .param("temperature", 0.2)
            .param("max_tokens", 64)
            .build();

        let body = encode_chat(&request, false).unwrap();
        assert_eq!(body["temperature"], 0.2);
        assert_eq!(body["max_tokens"], 64);
    }

    #[test]
    fn missing_model_is_rejected() {
        let request = ChatRequest::builder("  ").message(Message::user("hi")).build();
        let err = encode_chat(&request, false).unwrap_err();
        assert!(matches!(err, GatewayError::Encoding(_)));
    }

    #[test]
    fn empty_conversation_is_rejected() {
        let request = ChatRequest::builder("m").build();
        let err = encode_chat(&request, true).unwrap_err();
        assert!(err.to_string().contains("at least one message"));
    }

    #[test]
    fn reserved_param_is_rejected() {
        let request = ChatRequest::builder("m")
            .message(Message::user("hi"))
            .param("stream", true)
            .build();
        let err = encode_chat(&request, false).unwrap_err();
        assert!(err.to_string().contains("`stream` is reserved"));
    }

    #[test]
    fn tool_keys_cannot_be_smuggled_in_as_params() {
        let request = ChatRequest::builder("m")
            .message(Message::user("hi"))
            .param("tool_choice", "required")
            .build();
        let err = encode_chat(&request, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
        assert!(err.to_string().contains("`tool_choice` is reserved"));

        let request = ChatRequest::builder("m")
            .message(Message::user("hi"))
            .param("tools", json!([]))
            .build();
        assert!(encode_chat(&request, false).unwrap_err().to_string().contains("`tools` is reserved"));
    }

    #[test]
    fn tools_and_choice() {
        let request = ChatRequest::builder("m")
            .message(Message::user("what is 1+1?"))
            .tools(vec![ToolDefinition::function(
                "calc",
                Some("Evaluate arithmetic".to_owned()),
                Some(json!({"type": "object", "properties": {"a": {"type": "number"}}})),
            )])
            .tool_choice("auto")
            .build();

        let body = encode_chat(&request, false).unwrap();
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "calc");
        assert_eq!(body["tool_choice"], "auto");
    }

    #[test]
    fn tool_choice_without_tools_is_rejected() {
        let request = ChatRequest::builder("m")
            .message(Message::user("hi"))
            .tool_choice("required")
            .build();
        assert!(encode_chat(&request, false).is_err());
    }

    #[test]
    fn tool_round_trip_messages() {
        let request = ChatRequest::builder("m")
            .messages([
                Message::system("be terse"),
                Message::user("1+1?"),
                Message::assistant_tool_calls(vec![ToolCall {
                    id: Some("call_1".to_owned()),
                    name: "calc".to_owned(),
                    arguments: r#"{"a":1}"#.to_owned(),
                }]),
                Message::tool_result("call_1", "2"),
            ])
            .build();

        let body = encode_chat(&request, false).unwrap();
        let messages = body["messages"].as_array().unwrap();

        assert_eq!(messages[0], json!({"role": "system", "content": "be terse"}));
        assert_eq!(messages[2]["content"], Value::Null);
        assert_eq!(messages[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(messages[2]["tool_calls"][0]["function"]["arguments"], r#"{"a":1}"#);
        assert_eq!(
            messages[3],
            json!({"role": "tool", "content": "2", "tool_call_id": "call_1"})
        );
    }

    #[test]
    fn several_text_parts_become_an_array() {
        let message = Message::new(
            crate::types::Role::User,
            vec![
                ContentPart::Text { text: "a".to_owned() },
                ContentPart::Text { text: "b".to_owned() },
            ],
        );
        let request = ChatRequest::builder("m").message(message).build();

        let body = encode_chat(&request, false).unwrap();
        assert_eq!(
            body["messages"][0]["content"],
            json!([{"type": "text", "text": "a"}, {"type": "text", "text": "b"}])
        );
    }
}
