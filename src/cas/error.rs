//! Error types.
//!
//! [`CasError`] aborts a request. [`AuthFailure`] ends a sign-in normally,
//! with a redirect carrying its [`FailureCode`].

use std::fmt;

use serde::Serialize;

use super::response::FailureReason;

/// Boxed error returned by host-supplied callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors the CAS client surfaces to its caller.
///
/// Rejected or unreadable tickets are not errors: they come back from the
/// strategy as an [`AuthFailure`]. Only configuration problems and transport
/// failures are raised here.
#[derive(Debug, thiserror::Error)]
pub enum CasError {
    /// Setup is unusable (missing host or login path, bad CA bundle, ...).
    #[error("CAS configuration error: {0}")]
    Configuration(String),

    /// The CAS server could not be reached or the exchange broke off.
    /// Never retried by the client.
    #[error("CAS transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A URL could not be built or parsed.
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl CasError {
    pub(crate) fn invalid_url(url: &str, source: url::ParseError) -> Self {
        CasError::InvalidUrl {
            url: url.to_string(),
            source,
        }
    }
}

/// Failure codes handed to the host's failure handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    /// Callback arrived without a `ticket` parameter.
    NoTicket,
    /// The server did not confirm the ticket.
    InvalidTicket,
    /// A Single Sign-Out notification could not be handled.
    LogoutRequest,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::NoTicket => "no_ticket",
            FailureCode::InvalidTicket => "invalid_ticket",
            FailureCode::LogoutRequest => "logout_request",
        }
    }

    /// Inverse of [`FailureCode::as_str`].
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "no_ticket" => Some(FailureCode::NoTicket),
            "invalid_ticket" => Some(FailureCode::InvalidTicket),
            "logout_request" => Some(FailureCode::LogoutRequest),
            _ => None,
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a Single Sign-Out notification was not handled.
#[derive(Debug, thiserror::Error)]
pub enum LogoutFailure {
    #[error("logout request is missing the logoutRequest parameter")]
    MissingPayload,

    #[error("logout request of {0} bytes exceeds the size limit")]
    TooLarge(usize),

    #[error("malformed logout request: {0}")]
    Malformed(String),

    #[error("single sign-out callback failed: {0}")]
    Callback(#[source] BoxError),
}

/// A named authentication failure, carrying its cause.
#[derive(Debug, thiserror::Error)]
pub enum AuthFailure {
    #[error("no CAS ticket in callback")]
    MissingTicket,

    #[error("invalid CAS ticket: {0}")]
    InvalidTicket(#[source] FailureReason),

    #[error(transparent)]
    LogoutRequest(#[from] LogoutFailure),
}

impl AuthFailure {
    pub fn code(&self) -> FailureCode {
        match self {
            AuthFailure::MissingTicket => FailureCode::NoTicket,
            AuthFailure::InvalidTicket(_) => FailureCode::InvalidTicket,
            AuthFailure::LogoutRequest(_) => FailureCode::LogoutRequest,
        }
    }
}
