use binwatch::{BinServer, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("binwatch=info")),
        )
        .init();

    let config = Config::from_env()?;
    match config.gateway.endpoint.as_deref() {
        Some(endpoint) => tracing::info!(endpoint, topic = %config.gateway.topic, "Starting"),
        None => tracing::info!("Starting without a broker"),
    }

    let server = BinServer::new(config);
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
