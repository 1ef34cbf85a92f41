//! # Metrics Collection
//!
//! Prometheus counters for authentication and the secret lifecycle. Recording
//! is a no-op until [`init_metrics`] installs the exporter.

use crate::config::ObservabilityConfig;
use crate::errors::{PasswordPalError, Result};
use ::tracing::{info, warn};
use metrics::{counter, describe_counter, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::OnceLock;

/// Metrics recorder that tracks application metrics
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Record an authentication attempt outcome
    pub fn record_authentication(&self, status: &str) {
        let labels = [("status", status.to_string())];
        counter!("auth_attempts_total", &labels).increment(1);
    }

    /// Record a login outcome by method (`password` or `google`)
    pub fn record_login(&self, method: &str, status: &str) {
        let labels = [("method", method.to_string()), ("status", status.to_string())];
        counter!("logins_total", &labels).increment(1);
    }

    pub fn record_secret_created(&self) {
        counter!("secrets_created_total").increment(1);
    }

    /// Record a retrieval outcome (`success`, `not_found`, `deleted`, ...)
    pub fn record_secret_retrieval(&self, outcome: &str) {
        let labels = [("outcome", outcome.to_string())];
        counter!("secret_retrievals_total", &labels).increment(1);
    }

    pub fn record_audit_failure(&self) {
        counter!("audit_log_failures_total").increment(1);
    }

    fn describe(&self) {
        describe_counter!("auth_attempts_total", Unit::Count, "Bearer token checks by outcome");
        describe_counter!("logins_total", Unit::Count, "Login attempts by method and outcome");
        describe_counter!("secrets_created_total", Unit::Count, "Secrets stored");
        describe_counter!(
            "secret_retrievals_total",
            Unit::Count,
            "Secret retrieval attempts by outcome"
        );
        describe_counter!(
            "audit_log_failures_total",
            Unit::Count,
            "Access log writes that failed and were dropped"
        );
    }
}

/// Global metrics recorder instance
static METRICS: OnceLock<MetricsRecorder> = OnceLock::new();

/// Initialize metrics collection and Prometheus exporter
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    let metrics_addr = match config.metrics_bind_address() {
        Some(addr) => addr,
        None => {
            warn!("Metrics disabled: no bind address configured");
            return Ok(());
        }
    };

    let socket_addr: SocketAddr = metrics_addr.parse().map_err(|e| {
        PasswordPalError::config(format!("Invalid metrics bind address '{}': {}", metrics_addr, e))
    })?;

    PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .add_global_label("service", &config.service_name)
        .install()
        .map_err(|e| {
            PasswordPalError::config(format!("Failed to initialize metrics exporter: {}", e))
        })?;

    let recorder = METRICS.get_or_init(MetricsRecorder::new);
    recorder.describe();

    info!(
        metrics_addr = %metrics_addr,
        service_name = %config.service_name,
        "Metrics collection initialized"
    );

    Ok(())
}

/// Get the global metrics recorder
pub fn get_metrics() -> Option<&'static MetricsRecorder> {
    METRICS.get()
}

pub fn record_authentication(status: &str) {
    if let Some(metrics) = get_metrics() {
        metrics.record_authentication(status);
    }
}

pub fn record_login(method: &str, status: &str) {
    if let Some(metrics) = get_metrics() {
        metrics.record_login(method, status);
    }
}

pub fn record_secret_created() {
    if let Some(metrics) = get_metrics() {
        metrics.record_secret_created();
    }
}

pub fn record_secret_retrieval(outcome: &str) {
    if let Some(metrics) = get_metrics() {
        metrics.record_secret_retrieval(outcome);
    }
}

pub fn record_audit_failure() {
    if let Some(metrics) = get_metrics() {
        metrics.record_audit_failure();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_exporter_is_a_no_op() {
        record_authentication("success");
        record_login("password", "success");
        record_secret_created();
        record_secret_retrieval("success");
        record_audit_failure();
    }

    #[test]
    fn disabled_port_skips_installation() {
        let config = ObservabilityConfig { metrics_port: 0, ..ObservabilityConfig::default() };
        assert!(init_metrics(&config).is_ok());
    }
}
