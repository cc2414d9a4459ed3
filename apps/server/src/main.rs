//! tldw HTTP server binary.

use anyhow::Context;
use tldw_core::{PipelineConfig, transcript::silence_whisper_logs};
use tldw_server::{AppState, ServerConfig, create_router};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let server_config = ServerConfig::from_env();
    let pipeline_config = PipelineConfig::from_env().context("invalid pipeline configuration")?;
    info!(
        data_dir = %pipeline_config.data_dir.display(),
        chunk_budget = pipeline_config.chunking.budget,
        chunk_overlap = pipeline_config.chunking.overlap,
        "pipeline configured"
    );
    if pipeline_config.whisper_model.is_some() {
        silence_whisper_logs();
    }

    let app = create_router(AppState::from_config(&pipeline_config));

    let addr = server_config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Colored output for development, JSON lines when `LOG_FORMAT=json`.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tldw_core=info,tldw_server=info,tower_http=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
