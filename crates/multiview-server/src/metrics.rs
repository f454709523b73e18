//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;
use tracing::info;

/// Failure to install the global recorder.
#[derive(Debug, Error)]
#[error("failed to install metrics recorder: {0}")]
pub struct MetricsError(#[from] BuildError);

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup before any metrics are recorded; a second call fails
/// because a global recorder is already set.
pub fn install_recorder() -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

// Metric names, shared by the coordinator and the socket loop.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// WebSocket connection lifetime seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Rejected admission attempts (counter, labels: reason).
pub const ADMISSIONS_REJECTED_TOTAL: &str = "admissions_rejected_total";
/// Messages relayed to peers (counter, labels: action).
pub const MESSAGES_RELAYED_TOTAL: &str = "messages_relayed_total";
/// Relay frames dropped on a full or closed peer queue (counter).
pub const RELAY_DROPS_TOTAL: &str = "relay_drops_total";
/// Inbound messages that were not relayed (counter, labels: kind).
pub const DISPATCH_ERRORS_TOTAL: &str = "dispatch_errors_total";
/// Participants evicted when their socket closed (counter).
pub const PARTICIPANTS_EVICTED_TOTAL: &str = "participants_evicted_total";
