//! API server initialization

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use super::mcp;
use super::middleware::{self, AllowedOrigins};
use super::routes::health;
use crate::core::CoreApp;
use crate::core::constants::MCP_PATH;

pub struct ApiServer {
    app: CoreApp,
    allowed_origins: AllowedOrigins,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        let allowed_origins = AllowedOrigins::new(&app.config.server.host, app.config.server.port);
        Self {
            app,
            allowed_origins,
        }
    }

    /// Assemble the HTTP routes; the MCP endpoint is mounted only when enabled
    fn router(&self, ct: CancellationToken) -> Router {
        let router = Router::new().route("/api/v1/health", get(health::health));

        let router = if self.app.config.mcp.enabled {
            router.nest(MCP_PATH, mcp::routes(self.app.tools.clone(), ct))
        } else {
            tracing::debug!("MCP endpoint disabled by config");
            router
        };

        router
            .fallback(middleware::handle_404)
            .layer(TraceLayer::new_for_http())
            .layer(middleware::cors(&self.allowed_origins))
    }

    /// Serve until shutdown; returns CoreApp for graceful shutdown
    pub async fn start(self) -> Result<CoreApp> {
        let shutdown = self.app.shutdown.clone();

        let host = self.app.config.server.host.clone();
        let port = self.app.config.server.port;
        let addr = SocketAddr::new(
            host.parse()
                .with_context(|| format!("Invalid server.host '{}'", host))?,
            port,
        );

        let ct = mcp::cancellation_token_from_shutdown(&shutdown).await;
        let router = self.router(ct);

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::info!(
            address = %addr,
            mcp_enabled = self.app.config.mcp.enabled,
            mcp_path = MCP_PATH,
            "Server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.wait())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Server error");
                e
            })?;

        Ok(self.app)
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::core::cli::CliConfig;
    use crate::core::config::AppConfig;

    fn server(mcp: bool) -> ApiServer {
        let cli = CliConfig {
            mcp: Some(mcp),
            ..Default::default()
        };
        let config = AppConfig::load_with(&cli, |_| None).unwrap();
        ApiServer::new(CoreApp::init(config).unwrap())
    }

    #[tokio::test]
    async fn test_health_route() {
        let router = server(true).router(CancellationToken::new());
        let response = router
            .oneshot(
                Request::get("/api/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let router = server(true).router(CancellationToken::new());
        let response = router
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_mcp_disabled_is_not_mounted() {
        let router = server(false).router(CancellationToken::new());
        let response = router
            .oneshot(Request::post("/mcp").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
