use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Gateway endpoint used when neither a file nor the environment names one
pub const DEFAULT_ENDPOINT: &str = "http://localhost:4000";

/// Environment variable holding the gateway base URL
pub const ENDPOINT_VAR: &str = "LITELLM_API_ENDPOINT";

/// Environment variable holding the gateway API key
pub const API_KEY_VAR: &str = "LITELLM_KEY";

/// Connection settings for an OpenAI-compatible gateway
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Base URL of the gateway, without the `/v1` suffix
    pub endpoint: Url,
    /// Bearer token sent with every request
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Ceiling on a whole request, e.g. "30s" or "2m"
    #[serde(default)]
    pub timeout: Option<String>,
    /// Ceiling on establishing the connection
    #[serde(default)]
    pub connect_timeout: Option<String>,
}

impl GatewayConfig {
    /// Create a configuration for the given endpoint with no credentials
    pub const fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            api_key: None,
            timeout: None,
            connect_timeout: None,
        }
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    /// Set the request timeout (duration string such as "30s")
    #[must_use]
    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    /// Build the configuration from `LITELLM_API_ENDPOINT` and `LITELLM_KEY`
    ///
    /// An unset endpoint falls back to [`DEFAULT_ENDPOINT`]; a set but empty
    /// or unparseable one is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint variable holds an invalid URL
    pub fn from_env() -> anyhow::Result<Self> {
        let endpoint = match std::env::var(ENDPOINT_VAR) {
            Ok(raw) if raw.trim().is_empty() => anyhow::bail!("{ENDPOINT_VAR} is set but empty"),
            Ok(raw) => Url::parse(raw.trim()).map_err(|e| anyhow::anyhow!("invalid {ENDPOINT_VAR} `{raw}`: {e}"))?,
            Err(_) => {
                tracing::debug!(default = DEFAULT_ENDPOINT, "{ENDPOINT_VAR} not set, using default endpoint");
                Url::parse(DEFAULT_ENDPOINT)?
            }
        };

        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|k| !k.is_empty())
            .map(SecretString::from);

        Ok(Self {
            endpoint,
            api_key,
            timeout: None,
            connect_timeout: None,
        })
    }

    /// Parsed request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the configured value is not a valid duration
    pub fn request_timeout(&self) -> Result<Option<Duration>, String> {
        parse_duration("timeout", self.timeout.as_deref())
    }

    /// Parsed connect timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the configured value is not a valid duration
    pub fn connect_timeout(&self) -> Result<Option<Duration>, String> {
        parse_duration("connect_timeout", self.connect_timeout.as_deref())
    }

    /// Check the settings a client cannot work without
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid setting
    pub fn validate(&self) -> Result<(), String> {
        match self.endpoint.scheme() {
            "http" | "https" => {}
            other => return Err(format!("gateway endpoint must use http or https, got `{other}`")),
        }
        if self.endpoint.host_str().is_none_or(str::is_empty) {
            return Err("gateway endpoint has no host".to_owned());
        }
        self.request_timeout()?;
        self.connect_timeout()?;
        Ok(())
    }
}

fn parse_duration(field: &str, raw: Option<&str>) -> Result<Option<Duration>, String> {
    raw.map(|s| duration_str::parse(s).map_err(|e| format!("invalid gateway.{field} `{s}`: {e}")))
        .transpose()
}
