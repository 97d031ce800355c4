#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;
use webhook_receiver::{HandlerError, PathHandler};

/// Succeeds on an empty payload, fails with a recognizable message otherwise.
#[derive(Default)]
pub struct EmptyBodyHandler {
    calls: AtomicUsize,
}

impl EmptyBodyHandler {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub const HANDLER_ERROR_TEXT: &str = "internal handler detail";

#[async_trait]
impl PathHandler for EmptyBodyHandler {
    async fn handle(&self, payload: Bytes) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if payload.is_empty() {
            Ok(())
        } else {
            Err(HANDLER_ERROR_TEXT.into())
        }
    }
}

/// Signals when it starts, then sleeps before succeeding.
pub struct SlowHandler {
    pub entered: Notify,
    delay: Duration,
}

impl SlowHandler {
    pub fn new(delay: Duration) -> Self {
        Self {
            entered: Notify::new(),
            delay,
        }
    }
}

#[async_trait]
impl PathHandler for SlowHandler {
    async fn handle(&self, _payload: Bytes) -> Result<(), HandlerError> {
        self.entered.notify_one();
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}
