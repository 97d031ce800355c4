//! Accept loop shared by the engines.
//!
//! Serves HTTP/1 connections until `shutdown` fires, then drains them
//! gracefully. Connections still open when `force` fires are aborted.

use std::io;
use std::time::Duration;

use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::Service;
use hyper::{Request, Response};
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::server::ServeSignals;
use crate::types::ServerConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

pub(crate) async fn serve<S, B>(
    listener: TcpListener,
    config: ServerConfig,
    signals: ServeSignals,
    service: S,
) where
    S: Service<Request<Incoming>, Response = Response<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    let ServeSignals {
        shutdown,
        force,
        finished,
    } = signals;

    let graceful = GracefulShutdown::new();
    let mut connections = JoinSet::new();
    let mut builder = http1::Builder::new();
    builder.timer(TokioTimer::new()).keep_alive(config.keep_alive);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        match accept_backoff(&err) {
                            Some(delay) => {
                                warn!(error = %err, "failed to accept webhook connection, backing off");
                                tokio::time::sleep(delay).await;
                            }
                            None => debug!(error = %err, "webhook connection dropped before accept"),
                        }
                        continue;
                    }
                };

                let conn = graceful.watch(builder.serve_connection(TokioIo::new(stream), service.clone()));
                connections.spawn(async move {
                    if let Err(err) = conn.await {
                        debug!(%peer, error = %err, "webhook connection closed with error");
                    }
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);

    tokio::select! {
        _ = graceful.shutdown() => {}
        _ = force.cancelled() => connections.abort_all(),
    }
    while connections.join_next().await.is_some() {}

    let _ = finished.send(true);
}

/// Per-connection failures are retried at once; anything else (e.g. running
/// out of file descriptors) waits before the next `accept`.
fn accept_backoff(err: &io::Error) -> Option<Duration> {
    match err.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused => None,
        _ => Some(ACCEPT_ERROR_BACKOFF),
    }
}
