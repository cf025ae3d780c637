//! Login handlers
//!
//! `GET /` serves the landing page, `GET /login` sends the user to the chosen
//! provider and `GET /callback` turns the provider's answer into a signed
//! credential delivered as cookies.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::header::{AUTHORIZATION, SET_COOKIE},
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, warn};

use crate::api::error::ApiError;
use crate::api::handlers::AppState;
use crate::issuance::Disposition;

/// Cookie lifetime in seconds
pub const COOKIE_MAX_AGE: u32 = 600;

/// Cookie carrying the hashed identity
pub const IDENTITY_COOKIE: &str = "X-Attribute-Email";

const INDEX_HTML: &str = include_str!("../../../static/index.html");

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    pub service: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub state: Option<String>,
    pub code: Option<String>,
}

/// GET /
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /login?service=<name>
pub async fn login(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LoginParams>,
) -> Result<Redirect, ApiError> {
    match state.issuer.start_login(params.service.as_deref()) {
        Ok(url) => {
            state.metrics.login_started();
            Ok(Redirect::temporary(&url))
        }
        Err(err) => {
            state.metrics.request_failed(err.disposition());
            Err(err.into())
        }
    }
}

/// GET /callback?state=<s>&code=<c>
///
/// Login failures, malformed queries included, send the user back to `/`
/// without detail; server-side failures answer 500.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CallbackParams>, QueryRejection>,
) -> Response {
    let params = match query {
        Ok(Query(params)) => params,
        Err(rejection) => {
            warn!(error = %rejection, "Unreadable callback query");
            state.metrics.request_failed(Disposition::RestartLogin);
            return Redirect::temporary("/").into_response();
        }
    };

    let result = state
        .issuer
        .complete_login(
            params.state.as_deref().unwrap_or_default(),
            params.code.as_deref().unwrap_or_default(),
        )
        .await;

    match result {
        Ok(issued) => {
            state.metrics.credential_issued();
            let bearer = cookie(&state.cookie_name, &issued.credential);
            let identity = cookie(IDENTITY_COOKIE, issued.identity.as_str());
            let authorization = format!("Bearer {}", issued.credential);

            (
                AppendHeaders([
                    (SET_COOKIE, bearer),
                    (SET_COOKIE, identity),
                    (AUTHORIZATION, authorization),
                ]),
                Redirect::temporary(&state.redirect_url),
            )
                .into_response()
        }
        Err(err) => {
            let disposition = err.disposition();
            state.metrics.request_failed(disposition);
            match disposition {
                Disposition::RestartLogin => Redirect::temporary("/").into_response(),
                Disposition::Reject | Disposition::ServerFault => {
                    error!(error = %err, "Credential issuance failed");
                    ApiError::from(err).into_response()
                }
            }
        }
    }
}

fn cookie(name: &str, value: &str) -> String {
    format!("{}={}; Max-Age={}; Path=/", name, value, COOKIE_MAX_AGE)
}
