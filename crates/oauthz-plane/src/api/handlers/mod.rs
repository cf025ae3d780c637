//! API request handlers

pub mod login;

pub use login::{
    callback, index, login, CallbackParams, LoginParams, COOKIE_MAX_AGE, IDENTITY_COOKIE,
};

use std::sync::Arc;

use crate::issuance::Issuer;
use crate::metrics::ServiceMetrics;

/// Application state shared across handlers
pub struct AppState {
    /// Login orchestration
    pub issuer: Issuer,
    /// Name of the cookie carrying the credential
    pub cookie_name: String,
    /// Where the user lands after a successful login
    pub redirect_url: String,
    /// Request outcome counters
    pub metrics: Arc<ServiceMetrics>,
}
