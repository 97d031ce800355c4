use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::Router;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::accept;
use crate::context::StopContext;
use crate::error::WebhookError;
use crate::handlers::HandlerRegistry;
use crate::request;
use crate::server::{Lifecycle, WebhookServer};
use crate::types::{PathHandler, ServerConfig, ServerLifecycleState};

/// Engine built on an axum [`Router`].
///
/// `start` serves inline: it occupies the calling task until the engine is
/// stopped, so callers usually spawn it. Every path goes through one
/// fallback route that looks the handler up at request time, which is what
/// allows registration after the socket is bound.
///
/// Connections are owned by `start` rather than detached, so stopping past
/// the deadline returns [`WebhookError::DeadlineExceeded`], closes whatever
/// is still open and then lets `start` return.
pub struct AxumWebhookServer {
    handlers: HandlerRegistry,
    config: ServerConfig,
    lifecycle: Lifecycle,
}

#[derive(Clone)]
struct RouterState {
    handlers: HandlerRegistry,
    max_body_size: usize,
}

impl AxumWebhookServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            handlers: HandlerRegistry::new(),
            config,
            lifecycle: Lifecycle::new(),
        }
    }

    /// The router `start` serves. Useful for mounting the webhook routes
    /// into a larger application or driving them with `tower` directly.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(route_webhook)
            .with_state(RouterState {
                handlers: self.handlers.clone(),
                max_body_size: self.config.max_body_size,
            })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The bound socket while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle.local_addr().await
    }

    pub async fn state(&self) -> ServerLifecycleState {
        self.lifecycle.state().await
    }
}

impl Default for AxumWebhookServer {
    fn default() -> Self {
        Self::new()
    }
}

async fn route_webhook(
    State(state): State<RouterState>,
    method: Method,
    uri: Uri,
    body: Body,
) -> StatusCode {
    request::dispatch(&state.handlers, state.max_body_size, &method, uri.path(), body).await
}

#[async_trait]
impl WebhookServer for AxumWebhookServer {
    async fn start(&self, address: &str) -> Result<(), WebhookError> {
        let listener = TcpListener::bind(address).await.map_err(|source| {
            error!(address, error = %source, "failed to bind webhook server");
            WebhookError::bind(address, source)
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| WebhookError::bind(address, source))?;

        let signals = self.lifecycle.begin(local_addr).await?;
        info!(address = %local_addr, "webhook server listening");

        let service = TowerToHyperService::new(self.router());
        accept::serve(listener, self.config.clone(), signals, service).await;

        Ok(())
    }

    async fn register_handler(
        &self,
        path: &str,
        handler: Arc<dyn PathHandler>,
    ) -> Result<(), WebhookError> {
        self.handlers.insert(path, handler).await;
        Ok(())
    }

    async fn stop(&self, ctx: StopContext) -> Result<(), WebhookError> {
        self.lifecycle.stop(&ctx).await.map(|_| ())
    }
}
