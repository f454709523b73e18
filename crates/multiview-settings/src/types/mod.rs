//! Settings types.

mod logging;
mod server;

pub use logging::LoggingSettings;
pub use server::{
    HEARTBEAT_INTERVAL_MS_RANGE, HEARTBEAT_TIMEOUT_MS_RANGE, MAX_MESSAGE_SIZE_RANGE,
    SEND_QUEUE_CAPACITY_RANGE, ServerSettings,
};

use std::fmt::Display;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MultiviewSettings {
    /// Network and coordinator settings.
    pub server: ServerSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl MultiviewSettings {
    /// Check value ranges and cross-field constraints that serde cannot express.
    ///
    /// The ranges are the same ones environment overrides are held to, so a
    /// settings file cannot configure what `MULTIVIEW_*` would refuse.
    pub fn validate(&self) -> Result<()> {
        let server = &self.server;
        check_range(
            "heartbeatIntervalMs",
            server.heartbeat_interval_ms,
            &HEARTBEAT_INTERVAL_MS_RANGE,
        )?;
        check_range(
            "heartbeatTimeoutMs",
            server.heartbeat_timeout_ms,
            &HEARTBEAT_TIMEOUT_MS_RANGE,
        )?;
        check_range("maxMessageSize", server.max_message_size, &MAX_MESSAGE_SIZE_RANGE)?;
        check_range(
            "sendQueueCapacity",
            server.send_queue_capacity,
            &SEND_QUEUE_CAPACITY_RANGE,
        )?;
        if server.heartbeat_timeout_ms < server.heartbeat_interval_ms {
            return Err(SettingsError::InvalidValue(format!(
                "heartbeatTimeoutMs ({}) must not be below heartbeatIntervalMs ({})",
                server.heartbeat_timeout_ms, server.heartbeat_interval_ms
            )));
        }
        Ok(())
    }
}

fn check_range<T>(field: &str, value: T, range: &RangeInclusive<T>) -> Result<()>
where
    T: PartialOrd + Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::InvalidValue(format!(
            "{field} ({value}) must be within {}..={}",
            range.start(),
            range.end()
        )))
    }
}
