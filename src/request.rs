//! Per-request lifecycle shared by every engine.
//!
//! 1. Resolve the handler for the exact path (404 when missing).
//! 2. Reject anything but `POST` with 405.
//! 3. Read the whole body, bounded by `max_body_size` (500 on failure).
//! 4. Run the handler: `Ok` maps to 200, `Err` to 500.
//!
//! Responses always carry an empty body; error details only go to the log.

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::{Method, StatusCode};
use tracing::warn;

use crate::error::RequestError;
use crate::handlers::HandlerRegistry;

#[cfg(feature = "metrics")]
fn metric_inc(name: &'static str) {
    metrics::increment_counter!(name);
}

#[cfg(not(feature = "metrics"))]
fn metric_inc(_name: &'static str) {}

/// Run one request through the lifecycle and return the status to send.
pub(crate) async fn dispatch<B>(
    handlers: &HandlerRegistry,
    max_body_size: usize,
    method: &Method,
    path: &str,
    body: B,
) -> StatusCode
where
    B: Body + Send,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let Some(handler) = handlers.get(path).await else {
        metric_inc("webhook.request.not_found");
        return StatusCode::NOT_FOUND;
    };

    if method != Method::POST {
        metric_inc("webhook.request.method_not_allowed");
        return StatusCode::METHOD_NOT_ALLOWED;
    }

    let payload = match read_body(body, max_body_size).await {
        Ok(payload) => payload,
        Err(err) => {
            metric_inc("webhook.request.body_error");
            warn!(path, error = %err, "webhook request body rejected");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    match handler.handle(payload).await {
        Ok(()) => {
            metric_inc("webhook.request.ok");
            StatusCode::OK
        }
        Err(err) => {
            metric_inc("webhook.request.handler_error");
            let err = RequestError::Handler(err);
            warn!(path, error = %err, "webhook handler failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, RequestError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Err(RequestError::BodyTooLarge { limit })
        }
        Err(err) => Err(RequestError::BodyRead(err.to_string())),
    }
}
