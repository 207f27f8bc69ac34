//! Domain types exchanged with callers
//!
//! These are independent of the wire format; [`crate::protocol`] holds the
//! JSON shapes the gateway speaks.

pub mod message;
pub mod request;
pub mod response;

pub use message::{ContentPart, Message, Role, ToolCall};
pub use request::{ChatRequest, ChatRequestBuilder, EmbedRequest, FunctionDefinition, ToolDefinition};
pub use response::{ChatResponse, ClientInfo, EmbedResponse, FinishReason, Usage};
