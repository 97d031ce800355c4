use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::context::StopContext;
use crate::error::WebhookError;
use crate::server::WebhookServer;
use crate::types::PathHandler;

/// When the shared engine is actually stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownPolicy {
    /// The first `stop` from any tenant stops the engine for everyone.
    #[default]
    FirstStop,

    /// Count `start` calls and stop the engine only when every tenant that
    /// started has also stopped. A `stop` before any `start` is ignored.
    LastTenant,
}

/// Start/stop bookkeeping owned by [`MultiTenantServer`].
///
/// Independent of the wrapped engine's own lifecycle state.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatcherGuard {
    pub started_once: bool,
    pub stopped_once: bool,
    /// Tenants that called `start` and have not stopped yet.
    pub active_tenants: usize,
}

/// Lets several tenants (bots) share one engine and its socket.
///
/// Each tenant treats this as its own [`WebhookServer`]:
/// - `start`: only the first call reaches the engine, later ones return `Ok`.
/// - `register_handler`: always forwarded; tenants must pick disjoint paths.
/// - `stop`: only the first call reaches the engine (see [`ShutdownPolicy`]).
///
/// With the default policy one tenant stopping closes the socket for all of
/// them.
pub struct MultiTenantServer {
    server: Arc<dyn WebhookServer>,
    policy: ShutdownPolicy,
    guard: Mutex<DispatcherGuard>,
}

impl MultiTenantServer {
    pub fn new(server: Arc<dyn WebhookServer>) -> Self {
        Self::with_policy(server, ShutdownPolicy::default())
    }

    pub fn with_policy(server: Arc<dyn WebhookServer>, policy: ShutdownPolicy) -> Self {
        Self {
            server,
            policy,
            guard: Mutex::new(DispatcherGuard::default()),
        }
    }

    /// The wrapped engine.
    pub fn inner(&self) -> &Arc<dyn WebhookServer> {
        &self.server
    }

    pub fn policy(&self) -> ShutdownPolicy {
        self.policy
    }

    pub async fn guard(&self) -> DispatcherGuard {
        self.guard.lock().await.clone()
    }
}

#[async_trait]
impl WebhookServer for MultiTenantServer {
    async fn start(&self, address: &str) -> Result<(), WebhookError> {
        {
            let mut guard = self.guard.lock().await;
            guard.active_tenants += 1;
            if guard.started_once {
                debug!(address, "shared webhook server already started");
                return Ok(());
            }
            guard.started_once = true;
        }

        // Not under the guard: blocking engines only return from `start`
        // once they are stopped.
        self.server.start(address).await
    }

    async fn register_handler(
        &self,
        path: &str,
        handler: Arc<dyn PathHandler>,
    ) -> Result<(), WebhookError> {
        self.server.register_handler(path, handler).await
    }

    async fn stop(&self, ctx: StopContext) -> Result<(), WebhookError> {
        let mut guard = self.guard.lock().await;
        if guard.stopped_once {
            return Ok(());
        }
        if self.policy == ShutdownPolicy::LastTenant && !guard.started_once {
            debug!("no tenant started the shared webhook server, nothing to stop");
            return Ok(());
        }

        guard.active_tenants = guard.active_tenants.saturating_sub(1);
        if self.policy == ShutdownPolicy::LastTenant && guard.active_tenants > 0 {
            debug!(
                remaining = guard.active_tenants,
                "tenant stopped, shared webhook server kept running"
            );
            return Ok(());
        }

        guard.stopped_once = true;
        // Held while forwarding so concurrent stoppers return after shutdown.
        self.server.stop(ctx).await
    }
}
