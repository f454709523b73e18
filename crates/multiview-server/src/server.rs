//! `CoordinatorServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use multiview_core::AdmissionError;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::coordinator::{ParticipantSummary, SessionRegistry};
use crate::health::{self, HealthResponse};
use crate::metrics::ADMISSIONS_REJECTED_TOTAL;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::connection::ClientConnection;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session directory.
    pub registry: Arc<SessionRegistry>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// Query string of the WebSocket admission route.
#[derive(Debug, Default, Deserialize)]
pub struct JoinParams {
    /// Participant identifier.
    pub id: Option<String>,
}

/// `GET /sessions/{session}` response body.
#[derive(Debug, Clone, Serialize)]
pub struct RosterResponse {
    /// Session name.
    pub session: String,
    /// Roster ordered by role, then id.
    pub participants: Vec<ParticipantSummary>,
    /// Attached transport channels.
    pub connections: usize,
}

/// The coordinator server.
pub struct CoordinatorServer {
    config: Arc<ServerConfig>,
    registry: Arc<SessionRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl CoordinatorServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new(config.evict_on_disconnect)),
            config: Arc::new(config),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics,
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/sessions/{session}", get(roster_handler))
            .route("/sessions/{session}/ws", get(ws_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve in the background.
    ///
    /// Returns the bound address (useful with port `0`) and the server task.
    /// The task finishes once [`ShutdownCoordinator::shutdown`] is called.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener =
            TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(%addr, "coordinator listening");

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(error) = result {
                warn!(%error, "server error");
            }
        });

        Ok((addr, handle))
    }

    /// Get the session directory.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let resp = health::health_check(
        state.start_time,
        state.registry.connection_count(),
        state.registry.session_count(),
    );
    Json(resp)
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// GET /sessions/{session}
async fn roster_handler(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RosterResponse>, StatusCode> {
    let session = state.registry.get(&name).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(RosterResponse {
        participants: session.roster(),
        connections: session.connection_count(),
        session: name,
    }))
}

/// GET /sessions/{session}/ws?id=<participant>
///
/// Checks the id, then the upgrade request, then admits the participant
/// before completing the handshake. A refused admission answers `400` with
/// the reason as body.
async fn ws_handler(
    Path(name): Path<String>,
    Query(params): Query<JoinParams>,
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(participant_id) = params.id.filter(|id| !id.is_empty()) else {
        return reject(&name, &AdmissionError::MissingIdentifier);
    };
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            warn!(session = %name, %rejection, "not a websocket upgrade");
            return rejection.into_response();
        }
    };

    let session = state.registry.session(&name);
    let (tx, rx) = mpsc::channel(state.config.queue_capacity());
    let connection = Arc::new(ClientConnection::new(tx));
    let admission = match session.admit(&participant_id, connection.clone()) {
        Ok(admission) => admission,
        Err(error) => return reject(&name, &error),
    };

    let failed_session = session.clone();
    let failed_connection = connection.id.clone();
    let previous = admission.previous;
    let shutdown = state.shutdown.token();
    upgrade
        .max_message_size(state.config.max_message_size)
        .on_failed_upgrade(move |error| {
            warn!(session = failed_session.name(), %error, "websocket upgrade failed");
            let _ = failed_session.withdraw(&failed_connection, previous);
        })
        .on_upgrade(move |socket| {
            run_ws_session(
                socket,
                session,
                participant_id,
                connection,
                rx,
                state.config,
                shutdown,
            )
        })
}

fn reject(session: &str, error: &AdmissionError) -> Response {
    counter!(ADMISSIONS_REJECTED_TOTAL, "reason" => error.code()).increment(1);
    warn!(session, reason = error.code(), "admission rejected");
    (StatusCode::BAD_REQUEST, error.to_string()).into_response()
}
