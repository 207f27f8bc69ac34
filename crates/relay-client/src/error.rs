/// Client-specific result type
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors from the gateway client
///
/// Malformed lines inside a stream are not errors; they are skipped and
/// counted on the stream.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The request could not be encoded; nothing was sent
    #[error("invalid request: {0}")]
    Encoding(String),

    /// Connection failure, timeout, or broken response body
    #[error("transport error: {0}")]
    Transport(String),

    /// Gateway answered with a non-success status
    #[error("gateway returned {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body, verbatim
        body: String,
    },

    /// Accumulated tool call could not be turned into a complete call
    #[error("tool call {index} could not be decoded: {reason}")]
    ToolCallDecode {
        /// Position of the call in the `tool_calls` array
        index: u32,
        /// What was wrong with it
        reason: String,
    },

    /// Non-streaming body was not a chat completion or embedding object
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Client was constructed with unusable settings
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Discriminant of [`GatewayError`], for callers that branch on kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Encoding,
    Transport,
    Http,
    ToolCallDecode,
    Decode,
    Config,
}

impl GatewayError {
    /// Which kind of failure this is
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Encoding(_) => ErrorKind::Encoding,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Http { .. } => ErrorKind::Http,
            Self::ToolCallDecode { .. } => ErrorKind::ToolCallDecode,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// HTTP status, for `Http` errors
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short label used in logs and metrics
    pub(crate) const fn outcome(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Encoding => "encoding_error",
            ErrorKind::Transport => "transport_error",
            ErrorKind::Http => "http_error",
            ErrorKind::ToolCallDecode => "tool_call_decode_error",
            ErrorKind::Decode => "decode_error",
            ErrorKind::Config => "config_error",
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Transport(format!("request timed out: {e}"))
        } else if e.is_connect() {
            Self::Transport(format!("connection failed: {e}"))
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(format!("failed to read response body: {e}"))
    }
}
