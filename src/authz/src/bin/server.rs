//! # Portal Gateway Server
//!
//! HTTP entry point of the user-portal API gateway. Every route is checked
//! against the configured role restrictions before it runs.
//!
//! ## Configuration
//!
//! - `PORTAL_CONFIG` - Settings file path (default: `config/portal.toml`, optional)
//! - `PORTAL__SERVER__PORT`, `PORTAL__AUTH__PASSTHROUGH`, ... - Overrides of any setting
//! - `RUST_LOG` - Log filter (default: `logger.level` setting)

use anyhow::Context;
use portal_authz::settings::{LogFormat, Settings};
use portal_authz::web::router_from_settings;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_CONFIG_PATH: &str = "config/portal.toml";

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logger.level));

    let registry = tracing_subscriber::registry().with(filter);

    match settings.logger.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path =
        std::env::var("PORTAL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let settings = Settings::load(&config_path)
        .with_context(|| format!("Failed to load settings from {}", config_path))?;

    init_tracing(&settings);

    info!("Starting portal gateway v{}", portal_authz::VERSION);
    info!("Configuration:");
    info!("  Environment: {}", settings.env);
    info!("  Address: {}", settings.bind_address());
    info!("  Restricted roles: {}", settings.auth.restrictions.len());
    if settings.auth.passthrough {
        info!("  Role enforcement disabled (passthrough)");
    }

    let app = router_from_settings(&settings);

    let listener = tokio::net::TcpListener::bind(settings.bind_address())
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind_address()))?;

    info!("Listening on {}", settings.bind_address());

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server shut down gracefully");
    Ok(())
}
