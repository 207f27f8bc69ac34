//! Metric names and instruments for gateway calls
//!
//! Instruments come from the global meter, so recording is a no-op until
//! [`crate::init`] installs a meter provider.

use std::time::Instant;

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram};

/// Instrumentation scope for all Relay metrics
pub const METER_NAME: &str = "relay";

/// Counter of gateway calls, labelled `operation` and `outcome`
pub const REQUEST_COUNT: &str = "relay.request.count";
/// Histogram of gateway call latency, in seconds
pub const REQUEST_DURATION: &str = "relay.request.duration";
/// Counter of streaming lines skipped as unparseable
pub const STREAM_DROPPED_LINES: &str = "relay.stream.dropped_lines";

/// Count of gateway calls by operation and outcome
#[must_use]
pub fn request_counter() -> Counter<u64> {
    opentelemetry::global::meter(METER_NAME)
        .u64_counter(REQUEST_COUNT)
        .with_description("Gateway calls by operation and outcome")
        .build()
}

/// Latency of gateway calls, in seconds
#[must_use]
pub fn request_duration() -> Histogram<f64> {
    opentelemetry::global::meter(METER_NAME)
        .f64_histogram(REQUEST_DURATION)
        .with_unit("s")
        .build()
}

/// Streaming lines that were not valid JSON and were skipped
#[must_use]
pub fn dropped_lines_counter() -> Counter<u64> {
    opentelemetry::global::meter(METER_NAME)
        .u64_counter(STREAM_DROPPED_LINES)
        .with_description("Streaming lines skipped because they could not be parsed")
        .build()
}

/// Record one finished call
pub fn record_request(operation: &'static str, outcome: &'static str, start: Instant) {
    let attributes = [KeyValue::new("operation", operation), KeyValue::new("outcome", outcome)];
    request_counter().add(1, &attributes);
    request_duration().record(start.elapsed().as_secs_f64(), &attributes);
}
