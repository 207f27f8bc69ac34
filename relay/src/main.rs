#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;
mod output;

use std::path::Path;

use anyhow::Context;
use args::{Args, ChatArgs, Command};
use clap::Parser;
use futures::StreamExt;
use output::StreamPrinter;
use relay_client::{ChatRequest, EmbedRequest, GatewayClient, Message};
use relay_config::{Config, GatewayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;

    // Initialize telemetry
    let _telemetry_guard = relay_telemetry::init(config.telemetry.as_ref(), &args.log)?;

    tracing::debug!(endpoint = %config.gateway.endpoint, "using gateway");

    let client = GatewayClient::new(&config.gateway).context("failed to create gateway client")?;

    match args.command {
        Command::Chat(chat) if chat.async_stream => chat_async(&client, &chat).await,
        // The blocking client must neither run nor be dropped on a runtime thread
        command => tokio::task::spawn_blocking(move || run_blocking(&client, command)).await?,
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Ok(Config {
            gateway: GatewayConfig::from_env()?,
            telemetry: None,
        }),
    }
}

fn chat_request(chat: &ChatArgs) -> ChatRequest {
    let mut builder = ChatRequest::builder(&chat.model);
    if let Some(system) = &chat.system {
        builder = builder.message(Message::system(system));
    }
    builder = builder.message(Message::user(&chat.prompt));
    if let Some(temperature) = chat.temperature {
        builder = builder.param("temperature", temperature);
    }
    builder.build()
}

fn run_blocking(client: &GatewayClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Chat(chat) if chat.stream => {
            let mut printer = StreamPrinter::default();
            for snapshot in client.chat_invoke_stream(&chat_request(&chat))? {
                printer.show(&snapshot?)?;
            }
            Ok(())
        }
        Command::Chat(chat) => {
            let response = client.chat_invoke(&chat_request(&chat))?;
            output::print_response(&response)
        }
        Command::Embed { model, text } => {
            let response = client.embed_invoke(&EmbedRequest::new(model, text))?;
            output::print_embedding(&response)
        }
        Command::Info => {
            output::print_info(&client.client_info());
            Ok(())
        }
    }
}

async fn chat_async(client: &GatewayClient, chat: &ChatArgs) -> anyhow::Result<()> {
    let mut stream = client.chat_invoke_stream_async(&chat_request(chat)).await?;

    let mut printer = StreamPrinter::default();
    while let Some(snapshot) = stream.next().await {
        printer.show(&snapshot?)?;
    }
    Ok(())
}
