//! Liveness endpoint.

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::{info, Level};

pub fn router() -> Router {
    Router::new().route("/healthz", get(healthz)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))),
    )
}

async fn healthz() -> &'static str {
    "OK\n"
}

/// Serve `/healthz` on `listener` until `shutdown` flips to `true`.
pub async fn serve(listener: TcpListener, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "health check endpoint listening");
    }

    axum::serve(listener, router())
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
}
