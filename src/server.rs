use std::mem;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::context::StopContext;
use crate::error::WebhookError;
use crate::types::{PathHandler, ServerLifecycleState};

/// Contract implemented by every HTTP engine.
///
/// Routing happens per request, so handlers may be registered before or
/// after `start`.
#[async_trait]
pub trait WebhookServer: Send + Sync {
    /// Bind `address` and begin accepting connections.
    ///
    /// Not idempotent: a second call on a running engine fails, with an
    /// address-in-use [`WebhookError::Bind`] when the address is the same.
    async fn start(&self, address: &str) -> Result<(), WebhookError>;

    /// Bind `handler` to the exact `path`, replacing any previous handler.
    async fn register_handler(
        &self,
        path: &str,
        handler: Arc<dyn PathHandler>,
    ) -> Result<(), WebhookError>;

    /// Stop accepting connections and wait for in-flight requests, bounded
    /// by `ctx`. A no-op returning `Ok` when the engine is idle or already
    /// stopped.
    async fn stop(&self, ctx: StopContext) -> Result<(), WebhookError>;
}

/// Handles given to an engine's serving loop when it enters `Running`.
pub(crate) struct ServeSignals {
    /// Cancelled when the engine should stop accepting and drain.
    pub shutdown: CancellationToken,
    /// Cancelled when the stop deadline passed; remaining connections are dropped.
    pub force: CancellationToken,
    /// Set to `true` by the serving loop once everything is released.
    pub finished: watch::Sender<bool>,
}

struct RunningServer {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    force: CancellationToken,
    finished: watch::Receiver<bool>,
}

enum ServerState {
    Idle,
    Running(RunningServer),
    /// Holds the drain signal so late `stop` callers can wait on it.
    Stopped(watch::Receiver<bool>),
}

/// What a call to [`Lifecycle::stop`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopOutcome {
    /// The engine was never started.
    NotStarted,
    /// Another caller already performed the shutdown.
    AlreadyStopped,
    /// This caller moved the engine to `Stopped` and the loop drained.
    Drained,
}

/// `Idle -> Running -> Stopped` state machine shared by the engines.
///
/// Transitions happen under one lock, so concurrent `stop` callers see
/// exactly one of them perform the shutdown.
pub(crate) struct Lifecycle {
    state: Mutex<ServerState>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(ServerState::Idle),
        }
    }

    /// Move `Idle -> Running` for a socket that is already bound.
    pub(crate) async fn begin(&self, local_addr: SocketAddr) -> Result<ServeSignals, WebhookError> {
        let mut state = self.state.lock().await;
        if !matches!(*state, ServerState::Idle) {
            return Err(WebhookError::AlreadyStarted);
        }

        let shutdown = CancellationToken::new();
        let force = CancellationToken::new();
        let (finished_tx, finished_rx) = watch::channel(false);

        *state = ServerState::Running(RunningServer {
            local_addr,
            shutdown: shutdown.clone(),
            force: force.clone(),
            finished: finished_rx,
        });

        Ok(ServeSignals {
            shutdown,
            force,
            finished: finished_tx,
        })
    }

    /// Move `Running -> Stopped` and wait for the serving loop to drain.
    ///
    /// Only the caller that performs the transition can fail with
    /// [`WebhookError::DeadlineExceeded`]. Later callers wait for the drain
    /// for as long as their own `ctx` allows and then return.
    pub(crate) async fn stop(&self, ctx: &StopContext) -> Result<StopOutcome, WebhookError> {
        let running = {
            let mut state = self.state.lock().await;
            let previous = mem::replace(&mut *state, ServerState::Idle);
            match previous {
                ServerState::Running(running) => {
                    // Cancel under the lock: once any `stop` returns, the
                    // loop has been told to release the listener.
                    running.shutdown.cancel();
                    *state = ServerState::Stopped(running.finished.clone());
                    running
                }
                ServerState::Idle => return Ok(StopOutcome::NotStarted),
                ServerState::Stopped(finished) => {
                    let mut waiting = finished.clone();
                    *state = ServerState::Stopped(finished);
                    drop(state);
                    tokio::select! {
                        _ = waiting.wait_for(|done| *done) => {}
                        _ = ctx.done() => {}
                    }
                    return Ok(StopOutcome::AlreadyStopped);
                }
            }
        };

        info!(address = %running.local_addr, "stopping webhook server");

        let mut finished = running.finished;
        tokio::select! {
            // A closed channel means the serving future was dropped, which
            // releases the listener as well.
            _ = finished.wait_for(|done| *done) => {
                info!(address = %running.local_addr, "webhook server stopped");
                Ok(StopOutcome::Drained)
            }
            _ = ctx.done() => {
                warn!(
                    address = %running.local_addr,
                    "webhook server shutdown deadline exceeded, closing remaining connections"
                );
                running.force.cancel();
                Err(WebhookError::DeadlineExceeded)
            }
        }
    }

    pub(crate) async fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.state.lock().await {
            ServerState::Running(running) => Some(running.local_addr),
            _ => None,
        }
    }

    pub(crate) async fn state(&self) -> ServerLifecycleState {
        match &*self.state.lock().await {
            ServerState::Idle => ServerLifecycleState::Idle,
            ServerState::Running(_) => ServerLifecycleState::Running,
            ServerState::Stopped(_) => ServerLifecycleState::Stopped,
        }
    }
}
