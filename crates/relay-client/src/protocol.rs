//! OpenAI-compatible chat completion and embedding wire format
//!
//! Response types are deliberately lenient: gateways in front of different
//! providers omit `id`, `object`, and `created` often enough that every
//! field a decoder can live without defaults.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::ToolDefinition;

// -- Request types --

/// Chat completion request body
#[derive(Debug, Serialize)]
pub struct WireRequest<'a> {
    /// Model identifier
    pub model: &'a str,
    /// Conversation messages
    pub messages: Vec<WireMessage>,
    /// Whether the gateway should stream the response
    pub stream: bool,
    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<&'a [ToolDefinition]>,
    /// Tool choice configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<&'a Value>,
    /// Caller-supplied parameters, merged into the top level
    #[serde(flatten)]
    pub params: &'a Map<String, Value>,
}

/// Message within a request
#[derive(Debug, Serialize)]
pub struct WireMessage {
    /// Message role
    pub role: &'static str,
    /// String or array of parts; `null` for a tool-call-only assistant turn
    pub content: Option<WireContent>,
    /// Tool calls made by the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    /// Tool call this message answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Content can be a string or array of content parts
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum WireContent {
    /// Plain text content
    Text(String),
    /// Array of content parts
    Parts(Vec<WireContentPart>),
}

/// Individual content part
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireContentPart {
    /// Text content
    Text {
        /// The text string
        text: String,
    },
}

/// Tool call within a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireToolCall {
    /// Tool call identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Tool type (always "function")
    #[serde(rename = "type", default = "function_type")]
    pub tool_type: String,
    /// Function call details
    pub function: WireFunctionCall,
}

/// Function call details within a tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFunctionCall {
    /// Function name
    #[serde(default)]
    pub name: Option<String>,
    /// JSON-encoded arguments
    #[serde(default)]
    pub arguments: String,
}

fn function_type() -> String {
    "function".to_owned()
}

/// Embedding request body
#[derive(Debug, Serialize)]
pub struct WireEmbedRequest<'a> {
    /// Model identifier
    pub model: &'a str,
    /// Text to embed
    pub input: &'a str,
}

// -- Response types --

/// Non-streaming chat completion response
#[derive(Debug, Deserialize)]
pub struct WireCompletion {
    /// Response identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Model used
    #[serde(default)]
    pub model: Option<String>,
    /// Generated choices
    pub choices: Vec<WireChoice>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

/// Choice within a response
#[derive(Debug, Deserialize)]
pub struct WireChoice {
    /// Generated message
    pub message: WireChoiceMessage,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Message within a response choice
#[derive(Debug, Deserialize)]
pub struct WireChoiceMessage {
    /// Text content
    #[serde(default)]
    pub content: Option<String>,
    /// Tool calls
    #[serde(default)]
    pub tool_calls: Option<Vec<WireToolCall>>,
}

/// Token usage
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct WireUsage {
    /// Prompt tokens
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Completion tokens
    #[serde(default)]
    pub completion_tokens: u32,
    /// Total tokens
    #[serde(default)]
    pub total_tokens: u32,
}

// -- Streaming types --

/// One `data:` payload of a streaming response
#[derive(Debug, Deserialize)]
pub struct WireChunk {
    /// Chunk identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Model used
    #[serde(default)]
    pub model: Option<String>,
    /// Delta choices; empty on a usage-only chunk
    #[serde(default)]
    pub choices: Vec<WireStreamChoice>,
    /// Usage, typically on the last chunk
    #[serde(default)]
    pub usage: Option<WireUsage>,
    /// Error reported by the gateway in place of further deltas
    #[serde(default)]
    pub error: Option<Value>,
}

/// Choice within a streaming chunk
#[derive(Debug, Deserialize)]
pub struct WireStreamChoice {
    /// Choice index
    #[serde(default)]
    pub index: u32,
    /// Incremental delta
    #[serde(default)]
    pub delta: WireDelta,
    /// Finish reason (present on the final content chunk)
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Delta content within a streaming choice
#[derive(Debug, Default, Deserialize)]
pub struct WireDelta {
    /// Incremental text content
    #[serde(default)]
    pub content: Option<String>,
    /// Incremental tool calls
    #[serde(default)]
    pub tool_calls: Option<Vec<WireToolCallDelta>>,
}

/// Tool call fragment within a streaming delta
#[derive(Debug, Deserialize)]
pub struct WireToolCallDelta {
    /// Position in the `tool_calls` array, stable for the whole stream
    #[serde(default)]
    pub index: u32,
    /// Tool call ID (first fragment only)
    #[serde(default)]
    pub id: Option<String>,
    /// Partial function call
    #[serde(default)]
    pub function: Option<WireFunctionDelta>,
}

/// Partial function call within a streaming tool call
#[derive(Debug, Deserialize)]
pub struct WireFunctionDelta {
    /// Function name (usually first fragment only)
    #[serde(default)]
    pub name: Option<String>,
    /// Arguments fragment
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Embedding response body
#[derive(Debug, Deserialize)]
pub struct WireEmbedResponse {
    /// One entry per input
    #[serde(default)]
    pub data: Vec<WireEmbedding>,
}

/// Single embedding entry
#[derive(Debug, Deserialize)]
pub struct WireEmbedding {
    /// The embedding vector
    #[serde(default)]
    pub embedding: Vec<f32>,
}
