//! HTTP plumbing to the gateway
//!
//! Blocking calls go through `reqwest::blocking`, async streaming through
//! the async client. The blocking client is built on first use, so a
//! program that only streams asynchronously never starts its runtime
//! thread.

use std::fmt;
use std::io::{BufRead, BufReader};
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use relay_config::GatewayConfig;
use secrecy::ExposeSecret;
use serde_json::Value;
use url::Url;

use crate::auth::TokenSource;
use crate::error::{GatewayError, Result};

/// Lines of an async response body, without line terminators
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Gateway route a request is sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `POST /v1/chat/completions`
    ChatCompletions,
    /// `POST /v1/embeddings`
    Embeddings,
}

/// Sends encoded requests and hands back status-checked bodies
pub struct GatewayTransport {
    http: reqwest::Client,
    blocking: OnceLock<reqwest::blocking::Client>,
    token_source: Arc<dyn TokenSource>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    chat_url: Url,
    embeddings_url: Url,
}

impl fmt::Debug for GatewayTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayTransport")
            .field("chat_url", &self.chat_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GatewayTransport {
    /// Build a transport for the configured gateway
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if a timeout does not parse, the
    /// endpoint cannot be extended with API paths, or the HTTP client
    /// cannot be built
    pub fn new(config: &GatewayConfig, token_source: Arc<dyn TokenSource>) -> Result<Self> {
        let timeout = config.request_timeout().map_err(GatewayError::Config)?;
        let connect_timeout = config.connect_timeout().map_err(GatewayError::Config)?;

        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        if let Some(t) = connect_timeout {
            builder = builder.connect_timeout(t);
        }
        let http = builder
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            blocking: OnceLock::new(),
            token_source,
            timeout,
            connect_timeout,
            chat_url: api_url(&config.endpoint, "chat/completions")?,
            embeddings_url: api_url(&config.endpoint, "embeddings")?,
        })
    }

    /// Full URL of a route
    pub const fn url(&self, route: Route) -> &Url {
        match route {
            Route::ChatCompletions => &self.chat_url,
            Route::Embeddings => &self.embeddings_url,
        }
    }

    /// POST a body and return the whole response text (blocking)
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Http` on a non-success status and
    /// `GatewayError::Transport` if the exchange fails
    pub fn send(&self, route: Route, body: &Value) -> Result<String> {
        let url = self.url(route);
        tracing::debug!(url = %url, "sending gateway request");

        let response = self.blocking_request(url, body)?.send()?;
        let response = check_status_blocking(response)?;
        Ok(response.text()?)
    }

    /// POST a chat body and return its response lines (blocking)
    ///
    /// The connection stays open until the returned iterator is exhausted
    /// or dropped.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Http` on a non-success status, before any line
    /// is read, and `GatewayError::Transport` if the request fails
    pub fn send_streaming(&self, body: &Value) -> Result<BlockingLines> {
        tracing::debug!(url = %self.chat_url, "opening blocking chat stream");

        let response = self
            .blocking_request(&self.chat_url, body)?
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()?;
        let response = check_status_blocking(response)?;

        Ok(BlockingLines {
            reader: BufReader::new(response),
            buf: Vec::new(),
        })
    }

    /// POST a chat body and return its response lines as an async stream
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Http` on a non-success status, before any line
    /// is read, and `GatewayError::Transport` if the request fails
    pub async fn send_streaming_async(&self, body: &Value) -> Result<LineStream> {
        tracing::debug!(url = %self.chat_url, "opening async chat stream");

        let mut request = self
            .http
            .post(self.chat_url.as_str())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(body);
        if let Some(token) = self.token_source.token() {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_error(status, body));
        }

        Ok(async_lines(Box::pin(response.bytes_stream())))
    }

    fn blocking_request(&self, url: &Url, body: &Value) -> Result<reqwest::blocking::RequestBuilder> {
        let mut request = self.blocking_client()?.post(url.as_str()).json(body);
        if let Some(token) = self.token_source.token() {
            request = request.bearer_auth(token.expose_secret());
        }
        Ok(request)
    }

    fn blocking_client(&self) -> Result<&reqwest::blocking::Client> {
        if let Some(client) = self.blocking.get() {
            return Ok(client);
        }

        let mut builder = reqwest::blocking::Client::builder().timeout(self.timeout);
        if let Some(t) = self.connect_timeout {
            builder = builder.connect_timeout(t);
        }
        let client = builder
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build blocking HTTP client: {e}")))?;

        Ok(self.blocking.get_or_init(|| client))
    }
}

/// Lines of a blocking response body
///
/// Dropping it closes the response and releases the connection.
pub struct BlockingLines {
    reader: BufReader<reqwest::blocking::Response>,
    buf: Vec<u8>,
}

impl fmt::Debug for BlockingLines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingLines").finish_non_exhaustive()
    }
}

impl Iterator for BlockingLines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => Some(Ok(decode_line(&self.buf))),
            Err(e) => Some(Err(e.into())),
        }
    }
}

/// Splits arbitrary byte chunks into lines
#[derive(Debug, Default)]
struct LineSplitter {
    buf: Vec<u8>,
}

impl LineSplitter {
    fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn next_line(&mut self) -> Option<String> {
        let end = self.buf.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.buf.drain(..=end).collect();
        Some(decode_line(&line))
    }

    /// Whatever is left once the body has ended
    fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(decode_line(&rest))
    }
}

fn async_lines(body: ByteStream) -> LineStream {
    let state = (body, LineSplitter::default(), false);

    Box::pin(stream::unfold(state, |(mut body, mut splitter, mut ended)| async move {
        loop {
            if let Some(line) = splitter.next_line() {
                return Some((Ok(line), (body, splitter, ended)));
            }
            if ended {
                return splitter.finish().map(|line| (Ok(line), (body, splitter, true)));
            }

            match body.next().await {
                Some(Ok(bytes)) => splitter.push(&bytes),
                Some(Err(e)) => {
                    splitter.buf.clear();
                    return Some((Err(e.into()), (body, splitter, true)));
                }
                None => ended = true,
            }
        }
    }))
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end_matches(['\n', '\r']).to_owned()
}

fn check_status_blocking(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    Err(http_error(status, body))
}

fn http_error(status: reqwest::StatusCode, body: String) -> GatewayError {
    tracing::warn!(status = status.as_u16(), "gateway returned an error status");
    GatewayError::Http {
        status: status.as_u16(),
        body,
    }
}

/// `{endpoint}/v1/{path}`, tolerating a trailing slash on the endpoint
fn api_url(endpoint: &Url, path: &str) -> Result<Url> {
    let base = endpoint.as_str().trim_end_matches('/');
    Url::parse(&format!("{base}/v1/{path}"))
        .map_err(|e| GatewayError::Config(format!("invalid gateway endpoint `{endpoint}`: {e}")))
}
