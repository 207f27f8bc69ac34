use secrecy::SecretString;

use super::message::{Message, ToolCall};

/// Reason the model stopped generating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural end of generation
    Stop,
    /// Hit the `max_tokens` limit
    Length,
    /// Model decided to call a tool
    ToolCalls,
    /// Content was filtered by safety systems
    ContentFilter,
    /// Any reason this client does not know by name
    Other(String),
}

impl FinishReason {
    /// Parse the provider's finish reason string
    pub fn parse(raw: &str) -> Self {
        match raw {
            "stop" | "end_turn" => Self::Stop,
            "length" | "max_tokens" => Self::Length,
            "tool_calls" | "function_call" | "tool_use" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens generated in the completion
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

/// A chat completion, either a partial streaming snapshot or final
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    /// Response identifier reported by the gateway
    pub id: Option<String>,
    /// Model that produced the response
    pub model: Option<String>,
    /// Assistant message: text and/or tool calls
    pub message: Message,
    /// Token usage; zero until the gateway reports it
    pub usage: Usage,
    /// Why generation stopped, once known
    pub finish_reason: Option<FinishReason>,
    /// `false` for intermediate streaming snapshots
    pub is_final: bool,
}

impl ChatResponse {
    /// Text of the assistant message
    pub fn text(&self) -> String {
        self.message.text_content()
    }

    /// Tool calls requested by the assistant
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.message.tool_calls().collect()
    }
}

/// Embedding response
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedResponse {
    /// The embedding vector; empty when the gateway returned no data
    pub embedding: Vec<f32>,
}

/// Connection details for libraries that talk to the gateway themselves
#[derive(Debug, Clone)]
pub struct ClientInfo {
    /// Bearer token, if one is configured
    pub api_key: Option<SecretString>,
    /// OpenAI-style base URL, including the `/v1` suffix
    pub api_endpoint: String,
}
