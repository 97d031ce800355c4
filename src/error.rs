use std::io;

use thiserror::Error;

use crate::types::HandlerError;

/// Errors returned by the lifecycle calls of a [`WebhookServer`](crate::WebhookServer).
///
/// Per-request failures never show up here; see [`RequestError`].
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Address unavailable or malformed.
    /// Fatal to the `start` call that produced it.
    #[error("failed to bind webhook server to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The engine already left the idle state.
    /// Engines are single-use: a stopped engine cannot be started again.
    #[error("webhook server already started")]
    AlreadyStarted,

    /// The engine could not release its socket or background tasks.
    #[error("webhook server failed to shut down: {0}")]
    Shutdown(String),

    /// The stop deadline passed before in-flight requests finished.
    #[error("webhook server shutdown deadline exceeded")]
    DeadlineExceeded,
}

/// Failure while processing a single inbound request.
///
/// Always contained within the request: it is logged and mapped to
/// `500 Internal Server Error`, and its text is never written to the response.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The transport failed while the body was being read.
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    /// The body exceeded the configured size limit.
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// The application callback reported a failure.
    #[error("handler failed: {0}")]
    Handler(#[source] HandlerError),
}

impl WebhookError {
    pub(crate) fn bind(address: impl Into<String>, source: io::Error) -> Self {
        WebhookError::Bind {
            address: address.into(),
            source,
        }
    }

    /// Whether this is a bind failure caused by the address being taken.
    pub fn is_address_in_use(&self) -> bool {
        matches!(
            self,
            WebhookError::Bind { source, .. } if source.kind() == io::ErrorKind::AddrInUse
        )
    }
}
