use anyhow::{Context, Result};
use std::path::PathBuf;

use partscout::config::Config;
use partscout::metrics;
use partscout::search::SearchEngine;
use partscout::server::SearchServer;

pub async fn serve(bind: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let mut config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }

    if let Err(e) = metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics disabled");
    }

    let engine = SearchEngine::from_config(&config).await;
    let server = SearchServer::new(config.server.clone(), engine);

    println!("Starting partscout search server");
    println!("================================");
    println!("  Bind: {}", config.server.bind);
    println!();
    println!("Endpoints:");
    println!("  POST /api/search/article - Search offers by article");
    println!("  GET  /api/health         - Health check");
    println!("  GET  /metrics            - Prometheus metrics");
    println!();

    server
        .start_with_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
