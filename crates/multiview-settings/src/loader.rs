//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`MultiviewSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate ranges and cross-field constraints
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use multiview_core::logging::LogFormat;
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{
    HEARTBEAT_INTERVAL_MS_RANGE, HEARTBEAT_TIMEOUT_MS_RANGE, MAX_MESSAGE_SIZE_RANGE,
    MultiviewSettings, SEND_QUEUE_CAPACITY_RANGE,
};

/// Resolve the path to the settings file (`~/.multiview/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".multiview").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<MultiviewSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON or the merged values fail validation, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<MultiviewSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Defaults deep-merged with the settings file, without env overrides.
fn load_file_layer(path: &Path) -> Result<MultiviewSettings> {
    let defaults = serde_json::to_value(MultiviewSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored (fall back to file/default).
pub fn apply_env_overrides(settings: &mut MultiviewSettings) {
    // ── Server settings ─────────────────────────────────────────────
    if let Some(v) = read_env_string("MULTIVIEW_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("MULTIVIEW_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_u64(
        "MULTIVIEW_HEARTBEAT_INTERVAL_MS",
        *HEARTBEAT_INTERVAL_MS_RANGE.start(),
        *HEARTBEAT_INTERVAL_MS_RANGE.end(),
    ) {
        settings.server.heartbeat_interval_ms = v;
    }
    if let Some(v) = read_env_u64(
        "MULTIVIEW_HEARTBEAT_TIMEOUT_MS",
        *HEARTBEAT_TIMEOUT_MS_RANGE.start(),
        *HEARTBEAT_TIMEOUT_MS_RANGE.end(),
    ) {
        settings.server.heartbeat_timeout_ms = v;
    }
    if let Some(v) = read_env_usize(
        "MULTIVIEW_MAX_MESSAGE_SIZE",
        *MAX_MESSAGE_SIZE_RANGE.start(),
        *MAX_MESSAGE_SIZE_RANGE.end(),
    ) {
        settings.server.max_message_size = v;
    }
    if let Some(v) = read_env_usize(
        "MULTIVIEW_SEND_QUEUE_CAPACITY",
        *SEND_QUEUE_CAPACITY_RANGE.start(),
        *SEND_QUEUE_CAPACITY_RANGE.end(),
    ) {
        settings.server.send_queue_capacity = v;
    }
    if let Some(v) = read_env_bool("MULTIVIEW_EVICT_ON_DISCONNECT") {
        settings.server.evict_on_disconnect = v;
    }

    // ── Logging settings ────────────────────────────────────────────
    if let Some(v) = read_env_string("MULTIVIEW_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_string("MULTIVIEW_LOG_FORMAT") {
        match LogFormat::parse(&v) {
            Some(format) => settings.logging.format = format,
            None => tracing::warn!(key = "MULTIVIEW_LOG_FORMAT", value = %v, "invalid log format, ignoring"),
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}
