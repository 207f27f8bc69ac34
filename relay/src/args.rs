use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Relay gateway client
#[derive(Debug, Parser)]
#[command(name = "relay", about = "Talk to an OpenAI-compatible LLM gateway")]
pub struct Args {
    /// Path to a configuration file; without one, settings come from
    /// `LITELLM_API_ENDPOINT` and `LITELLM_KEY`
    #[arg(short, long, env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter, in `tracing` env-filter syntax
    #[arg(long, default_value = "warn", env = "RELAY_LOG")]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a chat completion
    Chat(ChatArgs),
    /// Embed a piece of text
    Embed {
        /// Embedding model
        #[arg(short, long)]
        model: String,
        /// Text to embed
        text: String,
    },
    /// Print the gateway endpoint this client would use
    Info,
}

#[derive(Debug, clap::Args)]
pub struct ChatArgs {
    /// Model to use
    #[arg(short, long)]
    pub model: String,

    /// Print the answer as it streams in
    #[arg(long, conflicts_with = "async_stream")]
    pub stream: bool,

    /// Stream using the async client
    #[arg(long = "async")]
    pub async_stream: bool,

    /// System prompt
    #[arg(long)]
    pub system: Option<String>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f64>,

    /// User prompt
    pub prompt: String,
}
