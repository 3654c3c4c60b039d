use std::fmt;
use thiserror::Error;

/// Why a single provider call did not produce a usable result.
///
/// These never escape a provider as an `Err`: they are folded into an invalid
/// [`FetchResult`](crate::FetchResult) so the engine can move on to the next source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderFailure {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("transport failure: timed out ({0})")]
    Timeout(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("transport failure: HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport failure: rate limited: {0}")]
    RateLimited(String),

    #[error("format failure: {0}")]
    Format(String),
}

/// Coarse failure taxonomy shown to callers and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    ProviderUnavailable,
    ProviderTransportFailure,
    ProviderFormatFailure,
}

impl ProviderFailure {
    pub fn class(&self) -> FailureClass {
        match self {
            ProviderFailure::Unavailable(_) => FailureClass::ProviderUnavailable,
            ProviderFailure::Timeout(_)
            | ProviderFailure::Transport(_)
            | ProviderFailure::Status { .. }
            | ProviderFailure::RateLimited(_) => FailureClass::ProviderTransportFailure,
            ProviderFailure::Format(_) => FailureClass::ProviderFormatFailure,
        }
    }

    /// Convenience for the common "non-success status with a body" case.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        let mut message: String = body.into();
        if message.len() > 200 {
            let cut = (0..=200).rev().find(|i| message.is_char_boundary(*i)).unwrap_or(0);
            message.truncate(cut);
        }
        ProviderFailure::Status { status, message }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureClass::ProviderUnavailable => "ProviderUnavailable",
            FailureClass::ProviderTransportFailure => "ProviderTransportFailure",
            FailureClass::ProviderFormatFailure => "ProviderFormatFailure",
        };
        f.write_str(s)
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for ProviderFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderFailure::Timeout(err.to_string())
        } else if err.is_decode() {
            ProviderFailure::Format(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderFailure::status(status.as_u16(), err.to_string())
        } else {
            ProviderFailure::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderFailure {
    fn from(err: serde_json::Error) -> Self {
        ProviderFailure::Format(err.to_string())
    }
}

/// Deployment mistakes detected while wiring engines. These are the only fatal errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no providers registered for domain '{domain}'")]
    NoProviders { domain: String },

    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}
