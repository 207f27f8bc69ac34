//! Turning response lines into chat snapshots
//!
//! [`StreamDriver`] holds the per-call state machine; [`ChatStream`] and
//! [`chat_stream_async`] feed it lines from the blocking and async
//! transports.

use std::fmt;
use std::pin::Pin;
use std::time::Instant;

use futures::stream::{self, Stream, StreamExt};

use crate::accumulate::StreamState;
use crate::decode;
use crate::error::{GatewayError, Result};
use crate::parse::{ParsedLine, StreamError, parse_line};
use crate::transport::{BlockingLines, LineStream};
use crate::types::ChatResponse;

/// Async sequence of chat snapshots; the last `Ok` item has `is_final` set
pub type ChatResponseStream = Pin<Box<dyn Stream<Item = Result<ChatResponse>> + Send>>;

const OPERATION: &str = "chat_stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Streaming,
    Done,
    Errored,
}

/// Per-call streaming state machine
///
/// `Idle -> Streaming -> Done | Errored`. Once in a terminal phase it
/// yields nothing further.
#[derive(Debug)]
pub struct StreamDriver {
    state: StreamState,
    phase: Phase,
    start: Instant,
}

impl StreamDriver {
    /// Driver for a stream whose request started at `start`
    pub fn new(start: Instant) -> Self {
        Self {
            state: StreamState::default(),
            phase: Phase::Idle,
            start,
        }
    }

    /// Feed one line; returns the snapshot to yield, if any
    pub fn on_line(&mut self, line: &str) -> Option<Result<ChatResponse>> {
        if self.is_finished() {
            return None;
        }
        self.phase = Phase::Streaming;

        match parse_line(line) {
            ParsedLine::Skip => None,
            ParsedLine::Malformed(error) => {
                tracing::debug!(%error, line, "skipping unparseable stream line");
                self.state.record_dropped_line();
                relay_telemetry::metrics::dropped_lines_counter().add(1, &[]);
                None
            }
            ParsedLine::Done => Some(self.finish()),
            ParsedLine::Error(error) => self.fail(gateway_error(error)),
            ParsedLine::Chunk(chunk) => self
                .state
                .merge(chunk)
                .content_changed
                .then(|| Ok(self.state.snapshot())),
        }
    }

    /// Body ended without the `[DONE]` sentinel
    pub fn on_end(&mut self) -> Option<Result<ChatResponse>> {
        if self.is_finished() {
            return None;
        }
        if self.state.finish_reason().is_none() {
            tracing::warn!("stream ended without a finish reason or [DONE]; finalizing what was received");
        }
        Some(self.finish())
    }

    /// Transport failed mid-stream; the error is yielded once
    pub fn fail(&mut self, error: GatewayError) -> Option<Result<ChatResponse>> {
        if self.is_finished() {
            return None;
        }
        tracing::error!(%error, "chat stream failed");
        self.phase = Phase::Errored;
        relay_telemetry::metrics::record_request(OPERATION, error.outcome(), self.start);
        Some(Err(error))
    }

    /// Whether the stream reached `Done` or `Errored`
    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Done | Phase::Errored)
    }

    /// Abandon the stream; returns whether it was still open
    fn cancel(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        tracing::debug!("chat stream dropped before completion");
        self.phase = Phase::Errored;
        relay_telemetry::metrics::record_request(OPERATION, "cancelled", self.start);
        true
    }

    fn finish(&mut self) -> Result<ChatResponse> {
        let state = std::mem::take(&mut self.state);
        let result = decode::finalize(state);

        match &result {
            Ok(_) => {
                self.phase = Phase::Done;
                relay_telemetry::metrics::record_request(OPERATION, "ok", self.start);
            }
            Err(error) => {
                tracing::warn!(%error, "failed to finalize chat stream");
                self.phase = Phase::Errored;
                relay_telemetry::metrics::record_request(OPERATION, error.outcome(), self.start);
            }
        }

        result
    }
}

impl Drop for StreamDriver {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn gateway_error(error: StreamError) -> GatewayError {
    match error.code {
        Some(status) => GatewayError::Http {
            status,
            body: error.message,
        },
        None => GatewayError::Transport(format!("gateway reported an error mid-stream: {}", error.message)),
    }
}

/// Blocking sequence of chat snapshots
///
/// Yields a partial snapshot each time the text or tool calls change, then
/// exactly one final snapshot (or one error). Dropping it early closes the
/// connection.
pub struct ChatStream {
    lines: Option<BlockingLines>,
    driver: StreamDriver,
}

impl fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatStream")
            .field("driver", &self.driver)
            .finish_non_exhaustive()
    }
}

impl ChatStream {
    pub(crate) fn new(lines: BlockingLines, start: Instant) -> Self {
        Self {
            lines: Some(lines),
            driver: StreamDriver::new(start),
        }
    }
}

impl Iterator for ChatStream {
    type Item = Result<ChatResponse>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(lines) = self.lines.as_mut() {
            let item = match lines.next() {
                Some(Ok(line)) => self.driver.on_line(&line),
                Some(Err(e)) => self.driver.fail(e),
                None => self.driver.on_end(),
            };

            if self.driver.is_finished() {
                // Release the connection as soon as the outcome is known
                self.lines = None;
            }
            if item.is_some() {
                return item;
            }
        }
        None
    }
}

/// Drive an async line stream into a stream of snapshots
pub fn chat_stream_async(lines: LineStream, start: Instant) -> ChatResponseStream {
    let state = (Some(lines), StreamDriver::new(start));

    Box::pin(stream::unfold(state, |(mut lines, mut driver)| async move {
        while let Some(body) = lines.as_mut() {
            let item = match body.next().await {
                Some(Ok(line)) => driver.on_line(&line),
                Some(Err(e)) => driver.fail(e),
                None => driver.on_end(),
            };

            if driver.is_finished() {
                lines = None;
            }
            if let Some(item) = item {
                return Some((item, (lines, driver)));
            }
        }
        None
    }))
}
