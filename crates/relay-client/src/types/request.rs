use serde::Serialize;
use serde_json::{Map, Value};

use super::message::Message;

/// Tool definition offered to the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function specification
    pub function: FunctionDefinition,
}

impl ToolDefinition {
    /// Define a function tool
    pub fn function(name: impl Into<String>, description: Option<String>, parameters: Option<Value>) -> Self {
        Self {
            tool_type: "function".to_owned(),
            function: FunctionDefinition {
                name: name.into(),
                description,
                parameters,
            },
        }
    }
}

/// Function specification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// A chat completion request, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    params: Map<String, Value>,
    tools: Option<Vec<ToolDefinition>>,
    tool_choice: Option<Value>,
}

impl ChatRequest {
    /// Start building a request for `model`
    pub fn builder(model: impl Into<String>) -> ChatRequestBuilder {
        ChatRequestBuilder {
            request: Self {
                model: model.into(),
                messages: Vec::new(),
                params: Map::new(),
                tools: None,
                tool_choice: None,
            },
        }
    }

    /// Model identifier
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Conversation, oldest first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Provider parameters merged into the top level of the payload
    pub const fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Tools the model may call
    pub fn tools(&self) -> Option<&[ToolDefinition]> {
        self.tools.as_deref()
    }

    /// Tool selection hint
    pub const fn tool_choice(&self) -> Option<&Value> {
        self.tool_choice.as_ref()
    }
}

/// Builder for [`ChatRequest`]
#[derive(Debug, Clone)]
#[must_use]
pub struct ChatRequestBuilder {
    request: ChatRequest,
}

impl ChatRequestBuilder {
    /// Append a message
    pub fn message(mut self, message: Message) -> Self {
        self.request.messages.push(message);
        self
    }

    /// Append several messages
    pub fn messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.request.messages.extend(messages);
        self
    }

    /// Set a provider parameter such as `temperature` or `max_tokens`
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.request.params.insert(key.into(), value.into());
        self
    }

    /// Offer tools to the model
    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.request.tools = Some(tools);
        self
    }

    /// Constrain tool selection (`"auto"`, `"none"`, `"required"`, or a function object)
    pub fn tool_choice(mut self, choice: impl Into<Value>) -> Self {
        self.request.tool_choice = Some(choice.into());
        self
    }

    /// Finish building
    pub fn build(self) -> ChatRequest {
        self.request
    }
}

/// Embedding request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedRequest {
    /// Embedding model identifier
    pub model: String,
    /// Text to embed
    pub input: String,
}

impl EmbedRequest {
    /// Create an embedding request
    pub fn new(model: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            input: input.into(),
        }
    }
}
