#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! Client for OpenAI-compatible LLM gateways such as `LiteLLM`
//!
//! Sends chat completions and embeddings over HTTP, either blocking or
//! streamed. Streaming responses arrive as a sequence of snapshots: each
//! partial snapshot carries the text and tool calls received so far, and
//! the last one is fully decoded with tool call arguments checked as JSON.

pub mod accumulate;
pub mod auth;
mod client;
pub mod decode;
pub mod encode;
pub mod error;
pub mod parse;
mod protocol;
pub mod stream;
pub mod transport;
pub mod types;

pub use auth::{StaticToken, TokenSource};
pub use client::GatewayClient;
pub use error::{ErrorKind, GatewayError, Result};
pub use stream::{ChatResponseStream, ChatStream};
pub use types::*;
