use crate::pipeline::Orchestrator;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub mod router;

pub use router::{build_router, AppState};

/// HTTP Protocol Adapter
///
/// Owns the listener and hands every request to the shared [`Orchestrator`].
pub struct HttpAdapter {
    pub bind_addr: SocketAddr,
}

impl HttpAdapter {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self { bind_addr }
    }

    /// Serve until Ctrl-C.
    pub async fn serve(
        &self,
        orchestrator: Orchestrator,
        public_url: Option<String>,
    ) -> anyhow::Result<()> {
        let state = Arc::new(AppState {
            orchestrator,
            public_url,
        });
        let app = build_router(state);

        let listener = TcpListener::bind(self.bind_addr).await?;
        tracing::info!("🚀 Starting HTTP server on {}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
