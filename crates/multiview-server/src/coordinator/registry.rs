//! Process-wide directory of sessions, keyed by name.

use std::sync::Arc;

use dashmap::DashMap;

use super::session::Session;

/// Lazily populated map of session name to [`Session`].
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
    evict_on_disconnect: bool,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new(evict_on_disconnect: bool) -> Self {
        Self {
            sessions: DashMap::new(),
            evict_on_disconnect,
        }
    }

    /// Get a session, creating it on first use.
    pub fn session(&self, name: &str) -> Arc<Session> {
        if let Some(existing) = self.sessions.get(name) {
            return existing.value().clone();
        }
        self.sessions
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(Session::new(name, self.evict_on_disconnect)))
            .value()
            .clone()
    }

    /// Get an existing session.
    pub fn get(&self, name: &str) -> Option<Arc<Session>> {
        self.sessions.get(name).map(|entry| entry.value().clone())
    }

    /// Number of sessions created so far.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Live connections across every session.
    pub fn connection_count(&self) -> usize {
        self.sessions
            .iter()
            .map(|entry| entry.value().connection_count())
            .sum()
    }
}
