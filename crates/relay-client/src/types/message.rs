/// Role of a message participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// System instruction
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// Tool/function result
    Tool,
}

impl Role {
    /// Wire name of the role
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// One part of a message body
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    /// Plain text
    Text {
        /// The text string
        text: String,
    },
    /// A tool call issued by the assistant
    ToolCall(ToolCall),
    /// Output of a tool, answering an earlier tool call
    ToolResult {
        /// ID of the tool call this result answers
        tool_call_id: String,
        /// Tool output
        content: String,
    },
}

/// A tool/function call requested by the assistant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    /// Call identifier assigned by the provider, when it sent one
    pub id: Option<String>,
    /// Function name
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

impl ToolCall {
    /// Parse the argument string as JSON
    ///
    /// # Errors
    ///
    /// Returns the parse error when the arguments are not valid JSON, which
    /// can happen for snapshots taken before the stream finished
    pub fn parsed_arguments(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.arguments)
    }
}

/// Message in a conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Role of the message author
    pub role: Role,
    /// Ordered content parts
    pub content: Vec<ContentPart>,
}

impl Message {
    /// Create a message from a role and parts
    pub const fn new(role: Role, content: Vec<ContentPart>) -> Self {
        Self { role, content }
    }

    /// Create a system message
    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    /// Create an assistant text message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    /// Create an assistant message that requests tool calls
    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self::new(Role::Assistant, calls.into_iter().map(ContentPart::ToolCall).collect())
    }

    /// Create a tool result message
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(
            Role::Tool,
            vec![ContentPart::ToolResult {
                tool_call_id: tool_call_id.into(),
                content: content.into(),
            }],
        )
    }

    fn text(role: Role, text: impl Into<String>) -> Self {
        Self::new(role, vec![ContentPart::Text { text: text.into() }])
    }

    /// Concatenated text of all text parts
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::ToolCall(_) | ContentPart::ToolResult { .. } => None,
            })
            .collect()
    }

    /// Tool calls carried by this message, in order
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.content.iter().filter_map(|part| match part {
            ContentPart::ToolCall(call) => Some(call),
            ContentPart::Text { .. } | ContentPart::ToolResult { .. } => None,
        })
    }
}
