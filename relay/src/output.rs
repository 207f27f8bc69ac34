//! Terminal rendering of gateway responses

use std::io::{self, Write};

use relay_client::{ChatResponse, ClientInfo, EmbedResponse};
use secrecy::ExposeSecret;

/// Prints only the text that is new in each streaming snapshot
#[derive(Debug, Default)]
pub struct StreamPrinter {
    printed: usize,
}

impl StreamPrinter {
    pub fn show(&mut self, snapshot: &ChatResponse) -> anyhow::Result<()> {
        let text = snapshot.text();
        let mut out = io::stdout().lock();

        if let Some(new) = text.get(self.printed..) {
            out.write_all(new.as_bytes())?;
            self.printed = text.len();
        }
        out.flush()?;

        if snapshot.is_final {
            writeln!(out)?;
            drop(out);
            print_tool_calls(snapshot)?;
            log_usage(snapshot);
        }
        Ok(())
    }
}

pub fn print_response(response: &ChatResponse) -> anyhow::Result<()> {
    let text = response.text();
    if !text.is_empty() {
        println!("{text}");
    }
    print_tool_calls(response)?;
    log_usage(response);
    Ok(())
}

pub fn print_embedding(response: &EmbedResponse) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(&response.embedding)?);
    Ok(())
}

pub fn print_info(info: &ClientInfo) {
    let key = match &info.api_key {
        Some(key) if !key.expose_secret().is_empty() => "set",
        _ => "not set",
    };
    println!("endpoint: {}", info.api_endpoint);
    println!("api key:  {key}");
}

fn print_tool_calls(response: &ChatResponse) -> anyhow::Result<()> {
    for call in response.tool_calls() {
        let arguments = call.parsed_arguments()?;
        let line = serde_json::json!({
            "id": call.id,
            "name": call.name,
            "arguments": arguments,
        });
        println!("{line}");
    }
    Ok(())
}

fn log_usage(response: &ChatResponse) {
    tracing::info!(
        prompt_tokens = response.usage.prompt_tokens,
        completion_tokens = response.usage.completion_tokens,
        total_tokens = response.usage.total_tokens,
        finish_reason = ?response.finish_reason,
        "completion finished"
    );
}
