use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::types::PathHandler;

/// Exact-path handler table shared between an engine and its in-flight requests.
///
/// Lookups clone the handler out of the map, so the lock is never held while
/// a handler runs.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn PathHandler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `path`, replacing any previous handler.
    pub async fn insert(&self, path: impl Into<String>, handler: Arc<dyn PathHandler>) {
        let mut guard = self.handlers.write().await;
        guard.insert(path.into(), handler);
    }

    pub async fn get(&self, path: &str) -> Option<Arc<dyn PathHandler>> {
        let guard = self.handlers.read().await;
        guard.get(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.handlers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.handlers.read().await.is_empty()
    }
}
