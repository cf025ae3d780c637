//! OAuthz Issuance Service
//!
//! Hands out short-lived upload credentials for a storage container to
//! users who sign in with an external identity provider.
//!
//! ## Flow
//!
//! 1. `GET /login?service=<name>` records a single-use CSRF state and
//!    redirects to the provider consent page
//! 2. `GET /callback?state=<s>&code=<c>` consumes the state, trades the code
//!    for the user's verified email and hashes it
//! 3. the issuer reads the network's current epoch, builds the upload policy
//!    for the hashed identity and signs it
//! 4. the credential and the hashed identity are returned as cookies
//!
//! ## API Endpoints
//! - `GET /` - Landing page
//! - `GET /login` - Start a login
//! - `GET /callback` - Provider callback
//! - `GET /health` - Liveness check
//! - `GET /metrics` - Prometheus metrics, on a separate listener when enabled

pub mod api;
pub mod config;
pub mod issuance;
pub mod keys;
pub mod metrics;
pub mod network;
pub mod service;
pub mod state;

pub use api::create_router;
pub use api::handlers::AppState;
pub use config::{Config, ConfigError, TlsFiles};
pub use issuance::{Disposition, IssuanceError, IssuedCredential, Issuer};
pub use metrics::{create_metrics_router, ServiceMetrics};
pub use network::{EpochError, EpochSource, FixedEpoch, HttpEpochSource};
pub use service::{
    build_epoch_source, build_providers, build_state, load_tls, spawn_metrics_listener,
    spawn_state_reaper, StartupError,
};
pub use state::{StateError, StateStore};
