use std::fmt;

use reqwest::StatusCode;

/// Failure classification for one fetch against the uptime server.
#[derive(Debug)]
pub enum FetchError {
    /// The configured endpoint is not a usable URL. Fails before any
    /// request is sent.
    InvalidUrl,
    /// The server rejected the configured credentials (HTTP 401/403).
    AuthenticationFailed,
    /// Any other non-success HTTP status.
    ServerError(u16),
    /// Connection-level failure.
    Network(reqwest::Error),
    /// The request did not complete within the request timeout.
    Timeout,
    /// The response body could not be decoded.
    InvalidResponse,
}

impl FetchError {
    /// Transient failures eligible for the single automatic retry.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout | Self::ServerError(_))
    }

    /// Short operator-facing description, shown alongside the last good
    /// data when a refresh fails.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidUrl => "Invalid server URL - check the configured endpoint".to_owned(),
            Self::AuthenticationFailed => {
                "Authentication failed - check your credentials".to_owned()
            }
            Self::ServerError(code) => {
                format!("Server error ({code}) - the server may be down")
            }
            Self::Network(_) => "Network error - check your connection".to_owned(),
            Self::Timeout => "Request timed out - server may be unreachable".to_owned(),
            Self::InvalidResponse => "Invalid response from server".to_owned(),
        }
    }

    /// Classifies an HTTP status, passing success through.
    pub(crate) fn check_status(status: StatusCode) -> Result<(), Self> {
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(Self::AuthenticationFailed)
        } else {
            Err(Self::ServerError(status.as_u16()))
        }
    }

    /// Classifies a transport-level reqwest failure.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() { Self::Timeout } else { Self::Network(err) }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl => write!(f, "invalid endpoint URL"),
            Self::AuthenticationFailed => write!(f, "authentication failed"),
            Self::ServerError(code) => write!(f, "server returned status {code}"),
            Self::Network(err) => write!(f, "network error: {err}"),
            Self::Timeout => write!(f, "request timed out"),
            Self::InvalidResponse => write!(f, "invalid response body"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Network(err) => Some(err),
            _ => None,
        }
    }
}
