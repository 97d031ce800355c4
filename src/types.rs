use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

/// Failure reported by an application callback.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Application callback bound to one exact request path.
///
/// The payload is the raw request body; decoding it is the caller's
/// responsibility. Handlers may run concurrently, including several
/// invocations for the same path at once.
#[async_trait]
pub trait PathHandler: Send + Sync {
    async fn handle(&self, payload: Bytes) -> Result<(), HandlerError>;
}

#[async_trait]
impl<F> PathHandler for F
where
    F: Fn(Bytes) -> Result<(), HandlerError> + Send + Sync,
{
    async fn handle(&self, payload: Bytes) -> Result<(), HandlerError> {
        (self)(payload)
    }
}

/// Lifecycle of a single engine instance.
///
/// `Idle -> Running -> Stopped`; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerLifecycleState {
    Idle,
    Running,
    Stopped,
}

/// Engine settings.
///
/// Deserializable so it can sit inside an application's own config file;
/// missing fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Upper bound on a request body. Larger bodies are rejected with 500
    /// before the handler runs.
    pub max_body_size: usize,

    /// Whether HTTP/1.1 connections are kept open between requests.
    pub keep_alive: bool,
}

impl Default for ServerConfig {
    /// Defaults:
    /// - max_body_size: 10 MiB
    /// - keep_alive: true
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024,
            keep_alive: true,
        }
    }
}

impl ServerConfig {
    /// Set the maximum accepted body size in bytes.
    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Enable or disable HTTP keep-alive.
    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }
}
