mod common;

use std::sync::Arc;
use std::time::Duration;

use webhook_receiver::{MultiTenantServer, ShutdownPolicy, StopContext, WebhookServer};

use common::{client, EmptyBodyHandler};

#[cfg(feature = "server-hyper")]
#[tokio::test]
async fn test_tenants_share_one_socket() {
    use webhook_receiver::HyperWebhookServer;

    let engine = Arc::new(HyperWebhookServer::new());
    let shared = Arc::new(MultiTenantServer::new(engine.clone()));

    let first: Arc<dyn WebhookServer> = shared.clone();
    let second: Arc<dyn WebhookServer> = shared.clone();

    let first_handler = Arc::new(EmptyBodyHandler::default());
    let second_handler = Arc::new(EmptyBodyHandler::default());

    first.start("127.0.0.1:0").await.unwrap();
    first.register_handler("/bot1", first_handler.clone()).await.unwrap();
    // Address is ignored: the socket is already bound by the first tenant.
    second.start("127.0.0.1:0").await.unwrap();
    second.register_handler("/bot2", second_handler.clone()).await.unwrap();

    let addr = engine.local_addr().await.unwrap();
    let client = client();
    for path in ["bot1", "bot2"] {
        let response = client
            .post(format!("http://{addr}/{path}"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }
    assert_eq!(first_handler.calls(), 1);
    assert_eq!(second_handler.calls(), 1);

    // One tenant stopping closes the socket for both.
    first
        .stop(StopContext::with_timeout(Duration::from_secs(1)))
        .await
        .unwrap();
    assert!(client
        .post(format!("http://{addr}/bot2"))
        .send()
        .await
        .is_err());

    second.stop(StopContext::background()).await.unwrap();
}

#[cfg(feature = "server-hyper")]
#[tokio::test]
async fn test_last_tenant_policy_keeps_socket_open() {
    use webhook_receiver::HyperWebhookServer;

    let engine = Arc::new(HyperWebhookServer::new());
    let shared = MultiTenantServer::with_policy(engine.clone(), ShutdownPolicy::LastTenant);

    shared.start("127.0.0.1:0").await.unwrap();
    shared.start("127.0.0.1:0").await.unwrap();
    shared
        .register_handler("/bot", Arc::new(EmptyBodyHandler::default()))
        .await
        .unwrap();
    let addr = engine.local_addr().await.unwrap();

    shared.stop(StopContext::background()).await.unwrap();
    let response = client()
        .post(format!("http://{addr}/bot"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    shared.stop(StopContext::background()).await.unwrap();
    assert!(engine.local_addr().await.is_none());
}

#[cfg(feature = "server-axum")]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_engine_behind_dispatcher() {
    use webhook_receiver::AxumWebhookServer;

    let engine = Arc::new(AxumWebhookServer::new());
    let shared = Arc::new(MultiTenantServer::new(engine.clone()));

    let serving = {
        let shared = shared.clone();
        tokio::spawn(async move { shared.start("127.0.0.1:0").await })
    };

    let addr = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(addr) = engine.local_addr().await {
                return addr;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("server did not start");

    // Later tenants return right away instead of blocking.
    tokio::time::timeout(Duration::from_secs(1), shared.start("127.0.0.1:0"))
        .await
        .expect("second start blocked")
        .unwrap();

    let handler = Arc::new(EmptyBodyHandler::default());
    shared.register_handler("/bot", handler.clone()).await.unwrap();
    let response = client()
        .post(format!("http://{addr}/bot"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    shared
        .stop(StopContext::with_timeout(Duration::from_secs(1)))
        .await
        .unwrap();
    serving.await.unwrap().unwrap();
    assert_eq!(handler.calls(), 1);
}
