use std::sync::Arc;
use std::time::Instant;

use relay_config::GatewayConfig;
use relay_telemetry::metrics;

use crate::auth::{StaticToken, TokenSource};
use crate::decode;
use crate::encode::encode_chat;
use crate::error::{GatewayError, Result};
use crate::protocol::WireEmbedRequest;
use crate::stream::{ChatResponseStream, ChatStream, chat_stream_async};
use crate::transport::{GatewayTransport, Route};
use crate::types::{ChatRequest, ChatResponse, ClientInfo, EmbedRequest, EmbedResponse};

/// Client for an OpenAI-compatible gateway
///
/// Holds no per-call state, so one instance can serve any number of
/// concurrent calls.
#[derive(Debug)]
pub struct GatewayClient {
    transport: GatewayTransport,
    config: GatewayConfig,
}

impl GatewayClient {
    /// Create a client that authenticates with the configured API key
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if the configuration is invalid
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        Self::with_token_source(config, Arc::new(StaticToken::new(config.api_key.clone())))
    }

    /// Create a client that asks `token_source` for a token on every call
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if the configuration is invalid
    pub fn with_token_source(config: &GatewayConfig, token_source: Arc<dyn TokenSource>) -> Result<Self> {
        config.validate().map_err(GatewayError::Config)?;

        let transport = GatewayTransport::new(config, token_source)?;
        tracing::debug!(endpoint = %config.endpoint, "gateway client ready");

        Ok(Self {
            transport,
            config: config.clone(),
        })
    }

    /// Create a client from `LITELLM_API_ENDPOINT` and `LITELLM_KEY`
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if the environment holds an invalid
    /// endpoint
    pub fn from_env() -> Result<Self> {
        let config = GatewayConfig::from_env().map_err(|e| GatewayError::Config(format!("{e:#}")))?;
        Self::new(&config)
    }

    /// Send a chat request and wait for the complete response (blocking)
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid, the exchange fails, the
    /// gateway answers with an error status, or the response is malformed
    pub fn chat_invoke(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let start = Instant::now();
        let result = self.chat_invoke_inner(request);
        finish("chat", &result, start);
        result
    }

    fn chat_invoke_inner(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let body = encode_chat(request, false)?;
        tracing::debug!(model = request.model(), messages = request.messages().len(), "sending chat completion");

        let text = self.transport.send(Route::ChatCompletions, &body)?;
        let response = decode::decode_completion(&text)?;

        tracing::debug!(
            total_tokens = response.usage.total_tokens,
            tool_calls = response.tool_calls().len(),
            "chat completion received"
        );
        Ok(response)
    }

    /// Send a chat request and iterate over snapshots as they stream in
    /// (blocking)
    ///
    /// # Errors
    ///
    /// Returns an error before any snapshot if the request is invalid, the
    /// connection fails, or the gateway answers with an error status
    pub fn chat_invoke_stream(&self, request: &ChatRequest) -> Result<ChatStream> {
        let start = Instant::now();

        let opened = encode_chat(request, true).and_then(|body| {
            tracing::debug!(model = request.model(), "starting chat stream");
            self.transport.send_streaming(&body)
        });

        match opened {
            Ok(lines) => Ok(ChatStream::new(lines, start)),
            Err(error) => {
                record_failure("chat_stream", &error, start);
                Err(error)
            }
        }
    }

    /// Send a chat request and receive snapshots as an async stream
    ///
    /// # Errors
    ///
    /// Returns an error before any snapshot if the request is invalid, the
    /// connection fails, or the gateway answers with an error status
    pub async fn chat_invoke_stream_async(&self, request: &ChatRequest) -> Result<ChatResponseStream> {
        let start = Instant::now();

        let opened = match encode_chat(request, true) {
            Ok(body) => {
                tracing::debug!(model = request.model(), "starting async chat stream");
                self.transport.send_streaming_async(&body).await
            }
            Err(error) => Err(error),
        };

        match opened {
            Ok(lines) => Ok(chat_stream_async(lines, start)),
            Err(error) => {
                record_failure("chat_stream", &error, start);
                Err(error)
            }
        }
    }

    /// Embed a single text (blocking)
    ///
    /// A gateway answer with no data yields an empty vector.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Encoding` for an empty model or input, and
    /// transport, status, or decode errors from the exchange
    pub fn embed_invoke(&self, request: &EmbedRequest) -> Result<EmbedResponse> {
        let start = Instant::now();
        let result = self.embed_invoke_inner(request);
        finish("embed", &result, start);
        result
    }

    fn embed_invoke_inner(&self, request: &EmbedRequest) -> Result<EmbedResponse> {
        if request.model.trim().is_empty() {
            return Err(GatewayError::Encoding("model id is required".to_owned()));
        }
        if request.input.is_empty() {
            return Err(GatewayError::Encoding("input text is required".to_owned()));
        }

        let body = serde_json::to_value(WireEmbedRequest {
            model: &request.model,
            input: &request.input,
        })
        .map_err(|e| GatewayError::Encoding(e.to_string()))?;

        tracing::debug!(model = %request.model, "sending embedding request");
        let text = self.transport.send(Route::Embeddings, &body)?;
        let response = decode::decode_embedding(&text)?;

        if response.embedding.is_empty() {
            tracing::warn!(model = %request.model, "gateway returned no embedding data");
        }
        Ok(response)
    }

    /// Connection details for libraries that talk to the gateway directly
    pub fn client_info(&self) -> ClientInfo {
        ClientInfo {
            api_key: self.config.api_key.clone(),
            api_endpoint: format!("{}/v1", self.config.endpoint.as_str().trim_end_matches('/')),
        }
    }
}

fn finish<T>(operation: &'static str, result: &Result<T>, start: Instant) {
    match result {
        Ok(_) => metrics::record_request(operation, "ok", start),
        Err(error) => record_failure(operation, error, start),
    }
}

fn record_failure(operation: &'static str, error: &GatewayError, start: Instant) {
    tracing::warn!(operation, %error, "gateway call failed");
    metrics::record_request(operation, error.outcome(), start);
}
