#![allow(clippy::must_use_candidate)]

//! Configuration for the Relay gateway client
//!
//! Settings come from a TOML file (with `{{ env.VAR }}` placeholders) or,
//! when no file is used, straight from the process environment.

mod env;
pub mod gateway;
mod loader;
pub mod telemetry;

use serde::Deserialize;

pub use gateway::*;
pub use telemetry::TelemetryConfig;

/// Top-level Relay configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Gateway connection settings
    pub gateway: GatewayConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
