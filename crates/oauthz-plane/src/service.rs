//! Service assembly from configuration

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum_server::tls_rustls::RustlsConfig;
use oauthz_bridge::handlers::OAuthProvider;
use oauthz_bridge::{BridgeError, ProviderRegistry};
use oauthz_core::{CredentialMinter, OauthzError, PolicyBuilder};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::api::handlers::AppState;
use crate::config::{Config, ConfigError, TlsFiles};
use crate::issuance::Issuer;
use crate::keys::{key_pair_or_ephemeral, KeyError};
use crate::metrics::{create_metrics_router, ServiceMetrics};
use crate::network::{EpochError, EpochSource, HttpEpochSource, Unconfigured};
use crate::state::StateStore;

/// Shortest interval between two state purges
const MIN_PURGE_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] BridgeError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Epoch(#[from] EpochError),

    #[error(transparent)]
    Policy(#[from] OauthzError),

    #[error("Failed to load TLS certificate {certificate} and key {key}: {source}")]
    Tls {
        certificate: String,
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to bind metrics listener on {address}: {source}")]
    MetricsBind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Build the provider registry from configuration
pub fn build_providers(config: &Config) -> Result<ProviderRegistry, StartupError> {
    let mut registry = ProviderRegistry::new();
    for settings in &config.providers {
        registry.register(OAuthProvider::new(
            settings.name.clone(),
            settings.kind,
            settings.client.clone(),
        )?);
    }
    if registry.is_empty() {
        warn!("No identity providers configured; every login will be rejected");
    }
    Ok(registry)
}

/// Build the epoch source from configuration
pub fn build_epoch_source(config: &Config) -> Result<Arc<dyn EpochSource>, StartupError> {
    match &config.epoch_url {
        Some(url) => Ok(Arc::new(HttpEpochSource::new(url.clone())?)),
        None => {
            warn!("OAUTHZ_EPOCH_URL not set; callbacks will fail with 500");
            Ok(Arc::new(Unconfigured))
        }
    }
}

/// Assemble the shared application state
pub fn build_state(
    config: &Config,
    providers: ProviderRegistry,
    epochs: Arc<dyn EpochSource>,
) -> Result<AppState, StartupError> {
    let key_pair =
        key_pair_or_ephemeral(&config.signing_key_id, config.signing_key_path.as_deref())?;
    let policy = PolicyBuilder::new(config.policy_config())?;

    info!(
        container = %config.container_id,
        callback = %config.callback_url(),
        kid = %key_pair.kid(),
        public_key = %key_pair.public_key().to_base64(),
        lifetime = config.bearer_lifetime,
        age_epochs = policy.age_epochs(),
        providers = ?providers.names(),
        "Issuer configured"
    );

    let issuer = Issuer::new(
        providers,
        Arc::new(StateStore::new()),
        epochs,
        policy,
        CredentialMinter::new(Arc::new(key_pair)),
    )
    .with_subject(config.user_id.clone());

    Ok(AppState {
        issuer,
        cookie_name: config.cookie_name.clone(),
        redirect_url: config.redirect_url.clone(),
        metrics: Arc::new(ServiceMetrics::new()),
    })
}

/// Periodically drop pending logins older than `ttl`
pub fn spawn_state_reaper(
    states: Arc<StateStore>,
    ttl: Duration,
    metrics: Arc<ServiceMetrics>,
) -> JoinHandle<()> {
    let period = (ttl / 2).max(MIN_PURGE_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let purged = states.purge_older_than(ttl);
            if purged > 0 {
                metrics.states_purged(purged);
            }
        }
    })
}

/// Load the PEM certificate chain and key for the HTTPS listener
pub async fn load_tls(files: &TlsFiles) -> Result<RustlsConfig, StartupError> {
    // rustls needs a process-wide crypto provider before any server config is built
    let _ = rustls::crypto::ring::default_provider().install_default();

    RustlsConfig::from_pem_file(&files.certificate, &files.key)
        .await
        .map_err(|source| StartupError::Tls {
            certificate: files.certificate.display().to_string(),
            key: files.key.display().to_string(),
            source,
        })
}

/// Bind the metrics listener and serve it in the background
pub async fn spawn_metrics_listener(
    address: SocketAddr,
    metrics: Arc<ServiceMetrics>,
) -> Result<(SocketAddr, JoinHandle<()>), StartupError> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::MetricsBind { address, source })?;
    let bound = listener
        .local_addr()
        .map_err(|source| StartupError::MetricsBind { address, source })?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, create_metrics_router(metrics)).await {
            error!(error = %e, "Metrics listener stopped");
        }
    });
    info!(addr = %bound, "Metrics listening");
    Ok((bound, handle))
}
