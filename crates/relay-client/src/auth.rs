//! Bearer token sources

use secrecy::SecretString;

/// Supplies the bearer token for each request
///
/// Called once per request, so implementations can rotate tokens without
/// rebuilding the client. Returning `None` sends no `Authorization` header.
pub trait TokenSource: Send + Sync {
    /// Current token, if any
    fn token(&self) -> Option<SecretString>;
}

/// Fixed token taken from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<SecretString>);

impl StaticToken {
    /// Wrap an optional token
    pub const fn new(token: Option<SecretString>) -> Self {
        Self(token)
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> Option<SecretString> {
        self.0.clone()
    }
}

impl<F> TokenSource for F
where
    F: Fn() -> Option<SecretString> + Send + Sync,
{
    fn token(&self) -> Option<SecretString> {
        self()
    }
}
