//! Service metrics in Prometheus text format
//!
//! Served on a separate listener when `OAUTHZ_PROMETHEUS_ENABLED` is set.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::issuance::Disposition;

const NAMESPACE: &str = "oauthz";

/// Prometheus text exposition content type
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Counters and gauges for one service instance
#[derive(Debug)]
pub struct ServiceMetrics {
    up: AtomicU64,
    logins_started: AtomicU64,
    logins_rejected: AtomicU64,
    logins_restarted: AtomicU64,
    server_faults: AtomicU64,
    credentials_issued: AtomicU64,
    states_purged: AtomicU64,
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            up: AtomicU64::new(0),
            logins_started: AtomicU64::new(0),
            logins_rejected: AtomicU64::new(0),
            logins_restarted: AtomicU64::new(0),
            server_faults: AtomicU64::new(0),
            credentials_issued: AtomicU64::new(0),
            states_purged: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Flip the `up` gauge once the listener is bound
    pub fn set_service_started(&self) {
        self.up.store(1, Ordering::Relaxed);
    }

    pub fn login_started(&self) {
        self.logins_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn credential_issued(&self) {
        self.credentials_issued.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed request by how it was answered
    pub fn request_failed(&self, disposition: Disposition) {
        let counter = match disposition {
            Disposition::Reject => &self.logins_rejected,
            Disposition::RestartLogin => &self.logins_restarted,
            Disposition::ServerFault => &self.server_faults,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn states_purged(&self, count: usize) {
        self.states_purged.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn credentials_issued_total(&self) -> u64 {
        self.credentials_issued.load(Ordering::Relaxed)
    }

    pub fn failures_total(&self, disposition: Disposition) -> u64 {
        match disposition {
            Disposition::Reject => self.logins_rejected.load(Ordering::Relaxed),
            Disposition::RestartLogin => self.logins_restarted.load(Ordering::Relaxed),
            Disposition::ServerFault => self.server_faults.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        gauge(&mut output, "up", "App is up and running", self.up.load(Ordering::Relaxed));
        output.push_str(&format!("# HELP {}_version App version\n", NAMESPACE));
        output.push_str(&format!("# TYPE {}_version gauge\n", NAMESPACE));
        output.push_str(&format!(
            "{}_version{{version=\"{}\"}} 1\n",
            NAMESPACE,
            env!("CARGO_PKG_VERSION")
        ));
        gauge(
            &mut output,
            "uptime_seconds",
            "Time since service start",
            self.start_time.elapsed().as_secs(),
        );

        counter(
            &mut output,
            "logins_started_total",
            "Redirects to an identity provider",
            self.logins_started.load(Ordering::Relaxed),
        );
        counter(
            &mut output,
            "credentials_issued_total",
            "Bearer credentials issued",
            self.credentials_issued.load(Ordering::Relaxed),
        );

        output.push_str(&format!(
            "# HELP {}_failed_requests_total Failed login or callback requests\n",
            NAMESPACE
        ));
        output.push_str(&format!("# TYPE {}_failed_requests_total counter\n", NAMESPACE));
        for (reason, value) in [
            ("rejected", &self.logins_rejected),
            ("restarted", &self.logins_restarted),
            ("server_fault", &self.server_faults),
        ] {
            output.push_str(&format!(
                "{}_failed_requests_total{{reason=\"{}\"}} {}\n",
                NAMESPACE,
                reason,
                value.load(Ordering::Relaxed)
            ));
        }

        counter(
            &mut output,
            "states_purged_total",
            "Pending logins dropped after expiring",
            self.states_purged.load(Ordering::Relaxed),
        );

        output
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn gauge(output: &mut String, name: &str, help: &str, value: u64) {
    sample(output, name, help, "gauge", value);
}

fn counter(output: &mut String, name: &str, help: &str, value: u64) {
    sample(output, name, help, "counter", value);
}

fn sample(output: &mut String, name: &str, help: &str, kind: &str, value: u64) {
    output.push_str(&format!("# HELP {}_{} {}\n", NAMESPACE, name, help));
    output.push_str(&format!("# TYPE {}_{} {}\n", NAMESPACE, name, kind));
    output.push_str(&format!("{}_{} {}\n", NAMESPACE, name, value));
}

async fn export(State(metrics): State<Arc<ServiceMetrics>>) -> impl IntoResponse {
    ([(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], metrics.to_prometheus())
}

/// Router for the metrics listener
pub fn create_metrics_router(metrics: Arc<ServiceMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(export))
        .with_state(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prometheus_format() {
        let metrics = ServiceMetrics::new();
        metrics.set_service_started();
        metrics.login_started();
        metrics.login_started();
        metrics.credential_issued();
        metrics.request_failed(Disposition::RestartLogin);
        metrics.states_purged(3);

        let text = metrics.to_prometheus();
        assert!(text.contains("oauthz_up 1\n"));
        assert!(text.contains(&format!(
            "oauthz_version{{version=\"{}\"}} 1\n",
            env!("CARGO_PKG_VERSION")
        )));
        assert!(text.contains("oauthz_logins_started_total 2\n"));
        assert!(text.contains("oauthz_credentials_issued_total 1\n"));
        assert!(text.contains("oauthz_failed_requests_total{reason=\"restarted\"} 1\n"));
        assert!(text.contains("oauthz_failed_requests_total{reason=\"server_fault\"} 0\n"));
        assert!(text.contains("oauthz_states_purged_total 3\n"));
        assert!(text.contains("# TYPE oauthz_up gauge\n"));
    }

    #[test]
    fn test_down_until_started() {
        let metrics = ServiceMetrics::new();
        assert!(metrics.to_prometheus().contains("oauthz_up 0\n"));
    }

    #[test]
    fn test_failures_by_disposition() {
        let metrics = ServiceMetrics::new();
        metrics.request_failed(Disposition::Reject);
        metrics.request_failed(Disposition::ServerFault);
        metrics.request_failed(Disposition::ServerFault);

        assert_eq!(metrics.failures_total(Disposition::Reject), 1);
        assert_eq!(metrics.failures_total(Disposition::RestartLogin), 0);
        assert_eq!(metrics.failures_total(Disposition::ServerFault), 2);
    }
}
