use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;
use tracing_subscriber::EnvFilter;
use webhook_receiver::{
    HandlerError, HyperWebhookServer, MultiTenantServer, PathHandler, StopContext, WebhookServer,
};

/// Simulates a bot that takes a while to process each update.
struct SlowBot {
    name: &'static str,
}

#[async_trait]
impl PathHandler for SlowBot {
    async fn handle(&self, payload: Bytes) -> Result<(), HandlerError> {
        info!(bot = self.name, bytes = payload.len(), "processing update");
        tokio::time::sleep(Duration::from_secs(5)).await;
        info!(bot = self.name, "done");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let address = std::env::var("WEBHOOK_ADDR").unwrap_or_else(|_| "127.0.0.1:8443".to_string());
    let shared = Arc::new(MultiTenantServer::new(Arc::new(HyperWebhookServer::new())));

    for name in ["alpha", "beta"] {
        let bot: Arc<dyn WebhookServer> = shared.clone();
        bot.start(&address).await?;
        bot.register_handler(&format!("/bot/{name}"), Arc::new(SlowBot { name }))
            .await?;
    }
    info!(%address, "handling updates, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    info!("stopping");

    shared
        .stop(StopContext::with_timeout(Duration::from_secs(10)))
        .await?;
    info!("webhook done");

    Ok(())
}
