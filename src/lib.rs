//! Push-delivery (webhook) intake for messaging platforms.
//!
//! The remote platform POSTs event payloads to paths registered here; each
//! payload is handed, as raw bytes, to the application callback bound to
//! that exact path.
//!
//! ## Pieces
//! - [`WebhookServer`]: the `start` / `register_handler` / `stop` contract.
//! - [`AxumWebhookServer`]: `start` serves inline until stopped (feature `server-axum`).
//! - [`HyperWebhookServer`]: `start` spawns the accept loop and returns (feature `server-hyper`).
//! - [`MultiTenantServer`]: several bots sharing one engine and one socket.
//!
//! ## Transport contract
//! - `POST` to a registered path, handler `Ok` → `200`, empty body
//! - handler `Err`, or body read failure → `500`, empty body
//! - any other method → `405`, handler not called
//! - unregistered path → `404`
//!
//! ## Non-Guarantees
//! - Payload decoding or validation
//! - Retries (the platform redelivers on non-2xx)
//! - Authentication
//!
//! Logging goes through `tracing`; installing a subscriber is up to the
//! application.

#[cfg(any(feature = "server-axum", feature = "server-hyper"))]
mod accept;
mod context;
mod error;
mod handlers;
mod multi_tenant;
mod request;
mod server;
mod types;

#[cfg(feature = "server-axum")]
mod server_axum;

#[cfg(feature = "server-hyper")]
mod server_hyper;

pub use context::StopContext;
pub use error::{RequestError, WebhookError};
pub use handlers::HandlerRegistry;
pub use multi_tenant::{DispatcherGuard, MultiTenantServer, ShutdownPolicy};
pub use server::WebhookServer;
pub use types::{HandlerError, PathHandler, ServerConfig, ServerLifecycleState};

#[cfg(feature = "server-axum")]
pub use server_axum::AxumWebhookServer;

#[cfg(feature = "server-hyper")]
pub use server_hyper::HyperWebhookServer;
