//! # multiview-server
//!
//! Axum HTTP + `WebSocket` coordinator for two-participant sessions.
//!
//! - Session directory with lazily created sessions, one mutex per session
//! - Admission with a two-participant cap and `left`/`right` role assignment
//! - Message routing: sender validation, action dispatch, fan-out to the
//!   other live sockets of the session
//! - Heartbeat ping/pong, close-frame echo, opt-in eviction on disconnect
//! - `/health`, `/metrics` and a roster endpoint
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod coordinator;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::CoordinatorServer;
