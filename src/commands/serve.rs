use anyhow::{Context, Result};
use std::sync::Arc;

use apuntes::app::AppContext;
use apuntes::config::Config;
use apuntes::server::{shutdown_signal, ApiServer};

/// Run the HTTP API until Ctrl-C
pub async fn serve(mut config: Config, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind_address = bind
            .parse()
            .with_context(|| format!("Invalid bind address: {bind}"))?;
    }

    let context = Arc::new(AppContext::from_config(config).context("Failed to initialize")?);
    let server_config = &context.config.server;

    println!("Starting Apuntes API");
    println!("====================");
    println!("  Bind Address: {}", server_config.bind_address);
    println!("  LLM: {}", context.client.describe());
    println!(
        "  CORS: {}",
        if server_config.enable_cors {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "  Storage: {}",
        context
            .config
            .storage
            .sqlite_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "in-memory".to_string())
    );
    println!();

    ApiServer::new(context.clone())
        .start_with_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    let stats = context.registry.stats().await;
    tracing::info!(
        total = stats.total,
        running = stats.running,
        "Stopped; running jobs are abandoned"
    );
    Ok(())
}
