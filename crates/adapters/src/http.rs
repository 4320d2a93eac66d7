//! Shared HTTP helpers for platform adapters

use crosspost_domain::PublishError;
use reqwest::Client;
use std::time::Duration;

/// Default bound on every outbound call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

/// Map a reqwest failure (including timeouts) to a transport error.
///
/// The URL is dropped from the message since it may carry a token.
pub(crate) fn transport_error(error: reqwest::Error) -> PublishError {
    let error = error.without_url();
    if error.is_timeout() {
        PublishError::Transport(format!("request timed out: {}", error))
    } else {
        PublishError::Transport(error.to_string())
    }
}

pub(crate) fn remote_error(status: reqwest::StatusCode, body: impl Into<String>) -> PublishError {
    PublishError::Remote {
        status: Some(status.as_u16()),
        body: body.into(),
    }
}
