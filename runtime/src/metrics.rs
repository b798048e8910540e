//! Prometheus metrics for the registration pipeline.
//!
//! Covers:
//! - Registration and unregistration outcomes
//! - Ledger latency and conflicts
//! - Soft inconsistencies between ledger and interaction log
//! - Settlement channel publish failures
//!
//! # Example
//!
//! ```rust,no_run
//! use eventhub_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Start metrics server on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// The binary serves [`MetricsServer::render`] on [`MetricsServer::addr`].
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. A recorder that is
    /// already installed (for example by an earlier test) is not an error.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Address the scrape endpoint should listen on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder was not installed by this server.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "eventhub_registrations_total",
        "Registration requests by outcome"
    );
    describe_counter!(
        "eventhub_unregistrations_total",
        "Unregistration requests by outcome"
    );
    describe_counter!(
        "eventhub_soft_inconsistencies_total",
        "Ledger commits whose interaction record could not be appended"
    );
    describe_counter!(
        "eventhub_channel_publish_failures_total",
        "Settlement intents not accepted by the channel after all retries"
    );
    describe_counter!(
        "eventhub_ledger_conflicts_total",
        "Ledger attempts aborted by a concurrent update or timeout"
    );
    describe_counter!(
        "eventhub_interactions_appended_total",
        "Interaction records written to the log"
    );
    describe_histogram!(
        "eventhub_ledger_duration_seconds",
        "Time spent in ledger operations, retries included"
    );
}

/// Registration pipeline metrics recorder.
pub struct RegistrationMetrics;

impl RegistrationMetrics {
    /// Record the outcome of a register request.
    pub fn record_registration(outcome: &'static str) {
        counter!("eventhub_registrations_total", "outcome" => outcome).increment(1);
    }

    /// Record the outcome of an unregister request.
    pub fn record_unregistration(outcome: &'static str) {
        counter!("eventhub_unregistrations_total", "outcome" => outcome).increment(1);
    }

    /// Record a committed decision missing from the interaction log.
    pub fn record_soft_inconsistency() {
        counter!("eventhub_soft_inconsistencies_total").increment(1);
    }

    /// Record a settlement intent that could not be published.
    pub fn record_publish_failure() {
        counter!("eventhub_channel_publish_failures_total").increment(1);
    }
}

/// Ledger metrics recorder.
pub struct LedgerMetrics;

impl LedgerMetrics {
    /// Record the latency of a ledger operation.
    pub fn record_operation(operation: &'static str, duration: Duration) {
        histogram!("eventhub_ledger_duration_seconds", "operation" => operation)
            .record(duration.as_secs_f64());
    }

    /// Record a retryable ledger failure.
    pub fn record_conflict() {
        counter!("eventhub_ledger_conflicts_total").increment(1);
    }
}
