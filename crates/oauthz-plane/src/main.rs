//! OAuthz Server Binary
//!
//! Runs the credential issuance HTTP server.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use oauthz_plane::{
    build_epoch_source, build_providers, build_state, create_router, load_tls,
    spawn_metrics_listener, spawn_state_reaper, Config,
};

/// Time given to in-flight requests after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn init_tracing() {
    let level = std::env::var("OAUTHZ_LOG_LEVEL").unwrap_or_else(|_| "info".into());
    let env_filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::from_env()?;

    let providers = build_providers(&config)?;
    let epochs = build_epoch_source(&config)?;
    let state = Arc::new(build_state(&config, providers, epochs)?);
    let metrics = Arc::clone(&state.metrics);

    let reaper = spawn_state_reaper(
        Arc::clone(state.issuer.states()),
        config.state_ttl,
        Arc::clone(&metrics),
    );

    if let Some(address) = config.prometheus_address {
        spawn_metrics_listener(address, Arc::clone(&metrics)).await?;
    }

    let app = create_router(state);

    match &config.tls {
        Some(files) => {
            let tls = load_tls(files).await?;
            let handle = axum_server::Handle::new();
            let signal_handle = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                signal_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
            });

            info!(
                addr = %config.listen_address,
                version = env!("CARGO_PKG_VERSION"),
                "OAuthz listening (TLS)"
            );
            metrics.set_service_started();

            axum_server::bind_rustls(config.listen_address, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(config.listen_address).await?;
            info!(
                addr = %config.listen_address,
                version = env!("CARGO_PKG_VERSION"),
                "OAuthz listening"
            );
            metrics.set_service_started();

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    reaper.abort();
    Ok(())
}
