//! Health check surface

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use std::net::SocketAddr;
use tracing::info;

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn health_router() -> Router {
    Router::new().route("/health", get(health_check_handler))
}

/// Serve the health endpoint until the process exits.
pub async fn serve_health(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind health check server")?;

    info!("Health check available at http://{}/health", addr);

    axum::serve(listener, health_router())
        .await
        .context("Health check server failed")
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn health_returns_ok() {
        let response = health_router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 16).await.unwrap();
        assert_eq!(&body[..], b"OK");
    }
}
