use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Accepted `heartbeatIntervalMs` values.
pub const HEARTBEAT_INTERVAL_MS_RANGE: RangeInclusive<u64> = 1000..=600_000;
/// Accepted `heartbeatTimeoutMs` values.
pub const HEARTBEAT_TIMEOUT_MS_RANGE: RangeInclusive<u64> = 1000..=3_600_000;
/// Accepted `maxMessageSize` values.
pub const MAX_MESSAGE_SIZE_RANGE: RangeInclusive<usize> = 64..=16 * 1024 * 1024;
/// Accepted `sendQueueCapacity` values.
pub const SEND_QUEUE_CAPACITY_RANGE: RangeInclusive<usize> = 1..=65_536;

/// Server network and coordinator settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// HTTP / WebSocket port.
    pub port: u16,
    /// Interval between server pings, in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Close a socket after this long without a pong, in milliseconds.
    pub heartbeat_timeout_ms: u64,
    /// Largest accepted inbound frame in bytes.
    pub max_message_size: usize,
    /// Per-connection outbound queue length.
    pub send_queue_capacity: usize,
    /// Remove a participant from the roster when its socket goes away.
    pub evict_on_disconnect: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 90_000,
            max_message_size: 64 * 1024,
            send_queue_capacity: 64,
            evict_on_disconnect: false,
        }
    }
}
