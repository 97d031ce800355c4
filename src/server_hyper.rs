use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Empty;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::accept;
use crate::context::StopContext;
use crate::error::WebhookError;
use crate::handlers::HandlerRegistry;
use crate::request;
use crate::server::{Lifecycle, StopOutcome, WebhookServer};
use crate::types::{PathHandler, ServerConfig, ServerLifecycleState};

/// Event-loop engine on raw hyper HTTP/1 connections.
///
/// `start` returns as soon as the socket is bound; accepting runs on a
/// background task. Every connection is watched for graceful shutdown and
/// kept in a `JoinSet`, so the ones still open at the stop deadline are
/// aborted.
pub struct HyperWebhookServer {
    handlers: HandlerRegistry,
    config: ServerConfig,
    lifecycle: Lifecycle,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl HyperWebhookServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            handlers: HandlerRegistry::new(),
            config,
            lifecycle: Lifecycle::new(),
            accept_task: Mutex::new(None),
        }
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

impl Default for HyperWebhookServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookServer for HyperWebhookServer {
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

        let handlers = self.handlers.clone();
        let max_body_size = self.config.max_body_size;
        let service = service_fn(move |req: Request<Incoming>| {
            let handlers = handlers.clone();
            async move {
                let (parts, body) = req.into_parts();
                let status = request::dispatch(
                    &handlers,
                    max_body_size,
                    &parts.method,
                    parts.uri.path(),
                    body,
                )
                .await;
                Ok::<_, Infallible>(empty_response(status))
            }
        });

        let handle = tokio::spawn(accept::serve(
            listener,
            self.config.clone(),
            signals,
            service,
        ));
        *self.accept_task.lock().await = Some(handle);

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
        let result = match self.lifecycle.stop(&ctx).await {
            Ok(StopOutcome::Drained) => Ok(()),
            // The caller that performed the transition owns the join.
            Ok(StopOutcome::NotStarted | StopOutcome::AlreadyStopped) => return Ok(()),
            Err(err) => Err(err),
        };

        let task = self.accept_task.lock().await.take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                return Err(WebhookError::Shutdown(format!("accept loop failed: {err}")));
            }
        }

        result
    }
}

fn empty_response(status: StatusCode) -> Response<Empty<Bytes>> {
    let mut response = Response::new(Empty::new());
    *response.status_mut() = status;
    response
}
