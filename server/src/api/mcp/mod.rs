use std::sync::Arc;

use axum::Router;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use tokio_util::sync::CancellationToken;

use crate::core::shutdown::ShutdownService;
use crate::domain::MetricToolService;

mod tools;

use self::tools::McpServer;

type McpService = StreamableHttpService<McpServer>;

/// Streamable HTTP MCP service; every session gets its own `McpServer`
/// sharing one tool service.
pub fn routes(tools: Arc<MetricToolService>, ct: CancellationToken) -> Router<()> {
    let service = McpService::new(
        move || Ok(McpServer::new(tools.clone())),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            cancellation_token: ct,
            ..Default::default()
        },
    );

    Router::new().fallback_service(service)
}

/// Token cancelled once shutdown triggers, closing open MCP sessions
pub async fn cancellation_token_from_shutdown(shutdown: &ShutdownService) -> CancellationToken {
    let token = CancellationToken::new();
    let mut rx = shutdown.subscribe();
    let t = token.clone();
    let handle = tokio::spawn(async move {
        let _ = rx.wait_for(|&v| v).await;
        t.cancel();
    });
    shutdown.register(handle).await;
    token
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_cancellation_token_follows_shutdown() {
        let shutdown = ShutdownService::new();
        let token = cancellation_token_from_shutdown(&shutdown).await;
        assert!(!token.is_cancelled());

        tokio::time::timeout(Duration::from_secs(1), shutdown.shutdown())
            .await
            .unwrap();
        assert!(token.is_cancelled());
    }
}
