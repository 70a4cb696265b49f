use thiserror::Error;

/// Failure talking to the external calendar.
#[derive(Debug, Error)]
pub enum CalendarError {
    /// Transport failure (DNS, TLS, timeout, connection reset).
    #[error("calendar request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("calendar API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Service-account credentials are malformed or were rejected.
    #[error("calendar credentials: {0}")]
    Credentials(String),

    /// Injected or simulated outage.
    #[error("calendar unavailable: {0}")]
    Unavailable(String),
}

impl From<jsonwebtoken::errors::Error> for CalendarError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        CalendarError::Credentials(err.to_string())
    }
}
