//! WebSocket connection state, heartbeat and the per-socket session loop.

pub mod connection;
pub mod heartbeat;
pub mod session;
