//! Connection ID newtype.
//!
//! Participant IDs are supplied by clients and stay plain `String`s. Transport
//! channels get a server-generated UUID v7 so that two sockets bound to the
//! same participant can still be told apart during fan-out.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one attached transport channel.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Create a new random ID (UUID v7, time-ordered).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn new_id_is_uuid() {
        let id = ConnectionId::new();
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn display_matches_inner() {
        let id = ConnectionId::from("conn_1".to_string());
        assert_eq!(id.to_string(), "conn_1");
    }

    #[test]
    fn serializes_transparently() {
        let id = ConnectionId::from("conn_2".to_string());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""conn_2""#);
    }
}
