//! Service entry point
//!
//! Wires the registry, fan-out hub, ingestion gateway and HTTP routes together.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::error::Result;
use crate::fanout::FanoutHub;
use crate::ingest::IngestionGateway;
use crate::query::BinService;
use crate::registry::BinRegistry;
use crate::server::config::Config;
use crate::server::routes::{router, AppState};
use crate::stats::IngestStats;

/// Bin telemetry server
pub struct BinServer {
    config: Config,
    service: BinService,
}

impl BinServer {
    /// Create a new server with the given configuration
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(BinRegistry::with_config(config.registry.clone()));
        let hub = FanoutHub::with_capacity(config.server.broadcast_capacity);
        let service = BinService::new(registry, hub, Arc::new(IngestStats::new()));

        Self { config, service }
    }

    /// Handle for queries and admin operations
    pub fn service(&self) -> &BinService {
        &self.service
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.server.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the listener fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.server.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if self.config.server.seed_demo_bins {
            self.service.registry().seed_demo().await;
        }

        let gateway =
            IngestionGateway::new(self.config.gateway.clone(), self.service.clone()).spawn();
        let app = router(AppState::new(self.service.clone(), gateway.watch_state()));

        tracing::info!(addr = %listener.local_addr()?, "HTTP server listening");

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = axum::serve(listener, app).into_future() => result.map_err(Into::into),
        };

        // Stop broker, simulator and updater tasks
        gateway.shutdown();

        result
    }
}
