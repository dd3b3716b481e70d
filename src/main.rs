//! Entry point for the zipserve HTTP server.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use zipserve::{Args, FileServer, MountRegistry, ServeConfig};

const DEFAULT_LOG_FILTER: &str = "zipserve=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();
    if let Err(err) = args.validate() {
        eprintln!("error: {err}");
        std::process::exit(2);
    }

    let registry = Arc::new(MountRegistry::new());
    if let Some(archive) = &args.archive {
        registry.mount(archive).await?;
    }

    let app = FileServer::new(registry, ServeConfig::from(&args)).into_router();

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", args.host, args.port)).await?;
    tracing::info!(addr = %listener.local_addr()?, hot_mount = args.hot_mount, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutting down");
}
