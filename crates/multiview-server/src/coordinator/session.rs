//! One coordinated session: the participant roster plus the live connection set.
//!
//! Every mutation goes through the session's mutex, so admission, dispatch and
//! detach for one session are serialized while different sessions proceed in
//! parallel.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use multiview_core::{AdmissionError, ConnectionId, Role};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use tracing::{debug, info};

use crate::websocket::connection::ClientConnection;

/// Most participants a session holds at once.
pub const MAX_PARTICIPANTS: usize = 2;

/// A participant in the roster.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Client-supplied identifier, unique within the session.
    pub id: String,
    /// Assigned on first admission, never renegotiated.
    pub role: Role,
    /// Cleared for good once the participant sends `over`.
    pub active: bool,
    /// The transport channel the participant is currently bound to.
    pub connection: Arc<ClientConnection>,
    /// When the participant was first admitted.
    pub admitted_at: DateTime<Utc>,
}

impl Participant {
    /// Serializable view without the connection handle.
    pub fn summary(&self) -> ParticipantSummary {
        ParticipantSummary {
            id: self.id.clone(),
            role: self.role,
            active: self.active,
        }
    }
}

/// Public view of a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantSummary {
    /// Participant identifier.
    pub id: String,
    /// Assigned role.
    pub role: Role,
    /// Liveness flag.
    pub active: bool,
}

/// Outcome of a successful [`Session::admit`].
#[derive(Debug, Clone)]
pub struct Admission {
    /// The participant as admitted.
    pub participant: ParticipantSummary,
    /// Connection the participant was bound to before this admission, set
    /// only when an existing id rejoined.
    pub previous: Option<Arc<ClientConnection>>,
}

impl Admission {
    /// Whether an existing participant was rebound rather than inserted.
    pub fn is_rejoin(&self) -> bool {
        self.previous.is_some()
    }
}

/// State guarded by the session mutex.
#[derive(Debug, Default)]
pub struct SessionState {
    participants: HashMap<String, Participant>,
    connections: HashMap<ConnectionId, Arc<ClientConnection>>,
}

impl SessionState {
    /// Find a participant by id.
    pub fn lookup(&self, id: &str) -> Option<&Participant> {
        self.participants.get(id)
    }

    /// Clear a participant's `active` flag. Unknown ids are ignored.
    pub fn mark_inactive(&mut self, id: &str) {
        if let Some(participant) = self.participants.get_mut(id) {
            participant.active = false;
        }
    }

    /// Every live connection except `source`.
    pub fn peers<'a>(
        &'a self,
        source: &'a ConnectionId,
    ) -> impl Iterator<Item = &'a Arc<ClientConnection>> + 'a {
        self.connections
            .iter()
            .filter(move |(id, _)| *id != source)
            .map(|(_, conn)| conn)
    }

    fn bound_to(&self, connection: &ConnectionId) -> Option<String> {
        self.participants
            .values()
            .find(|p| &p.connection.id == connection)
            .map(|p| p.id.clone())
    }
}

/// A named session.
#[derive(Debug)]
pub struct Session {
    name: String,
    evict_on_disconnect: bool,
    state: Mutex<SessionState>,
}

impl Session {
    /// Create an empty session.
    pub fn new(name: impl Into<String>, evict_on_disconnect: bool) -> Self {
        Self {
            name: name.into(),
            evict_on_disconnect,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Session name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Admit a participant and attach its connection.
    ///
    /// The first participant of an empty roster becomes `left` and active,
    /// later ones `right` and inactive. An id already in the roster is rebound
    /// to the new connection and keeps its role and flag. A new id is refused
    /// once the roster holds [`MAX_PARTICIPANTS`], leaving the roster as it was.
    pub fn admit(
        &self,
        participant_id: &str,
        connection: Arc<ClientConnection>,
    ) -> Result<Admission, AdmissionError> {
        if participant_id.is_empty() {
            return Err(AdmissionError::MissingIdentifier);
        }

        let mut state = self.state.lock();

        if let Some(existing) = state.participants.get_mut(participant_id) {
            let previous = std::mem::replace(&mut existing.connection, connection.clone());
            let summary = existing.summary();
            info!(
                session = %self.name,
                participant = participant_id,
                role = %summary.role,
                admitted_at = %existing.admitted_at,
                "participant rejoined"
            );
            let _ = state.connections.insert(connection.id.clone(), connection);
            return Ok(Admission {
                participant: summary,
                previous: Some(previous),
            });
        }

        if state.participants.len() >= MAX_PARTICIPANTS {
            return Err(AdmissionError::SessionFull);
        }

        let first = state.participants.is_empty();
        let participant = Participant {
            id: participant_id.to_owned(),
            role: if first { Role::Left } else { Role::Right },
            active: first,
            connection: connection.clone(),
            admitted_at: Utc::now(),
        };
        let summary = participant.summary();
        let _ = state
            .participants
            .insert(participant_id.to_owned(), participant);
        let _ = state.connections.insert(connection.id.clone(), connection);

        info!(
            session = %self.name,
            participant = participant_id,
            role = %summary.role,
            "participant admitted"
        );
        Ok(Admission {
            participant: summary,
            previous: None,
        })
    }

    /// Snapshot of one participant.
    pub fn lookup(&self, participant_id: &str) -> Option<ParticipantSummary> {
        self.state.lock().lookup(participant_id).map(Participant::summary)
    }

    /// Clear a participant's `active` flag. Idempotent.
    pub fn mark_inactive(&self, participant_id: &str) {
        self.state.lock().mark_inactive(participant_id);
    }

    /// Remove a closed connection from the live set.
    ///
    /// With eviction enabled the participant currently bound to it is removed
    /// too, and its id is returned.
    pub fn detach(&self, connection: &ConnectionId) -> Option<String> {
        let mut state = self.state.lock();
        let _ = state.connections.remove(connection);
        debug!(session = %self.name, connection = %connection, "connection detached");

        if !self.evict_on_disconnect {
            return None;
        }
        let id = state.bound_to(connection)?;
        self.evict(&mut state, &id);
        Some(id)
    }

    /// Undo an admission whose upgrade never completed.
    ///
    /// `previous` is [`Admission::previous`]. A participant that rejoined is
    /// bound back to its earlier connection and keeps its role and flag; a
    /// participant admitted fresh is removed. The earlier connection is only
    /// abandoned when it has closed meanwhile and eviction is enabled. Returns
    /// the id of an evicted participant.
    pub fn withdraw(
        &self,
        connection: &ConnectionId,
        previous: Option<Arc<ClientConnection>>,
    ) -> Option<String> {
        let mut state = self.state.lock();
        let _ = state.connections.remove(connection);
        let id = state.bound_to(connection)?;

        if let Some(previous) = previous {
            let stale = !state.connections.contains_key(&previous.id);
            if !(stale && self.evict_on_disconnect) {
                if let Some(participant) = state.participants.get_mut(&id) {
                    participant.connection = previous;
                }
                debug!(session = %self.name, participant = %id, "rejoin withdrawn, previous connection restored");
                return None;
            }
        }

        self.evict(&mut state, &id);
        Some(id)
    }

    fn evict(&self, state: &mut SessionState, id: &str) {
        if let Some(participant) = state.participants.remove(id) {
            let member_for = Utc::now() - participant.admitted_at;
            info!(
                session = %self.name,
                participant = %id,
                member_for_secs = member_for.num_seconds(),
                "participant evicted"
            );
        }
    }

    /// Participants in the roster.
    pub fn participant_count(&self) -> usize {
        self.state.lock().participants.len()
    }

    /// Attached transport channels.
    pub fn connection_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    /// Roster snapshot ordered by role, then id.
    pub fn roster(&self) -> Vec<ParticipantSummary> {
        let mut roster: Vec<_> = self
            .state
            .lock()
            .participants
            .values()
            .map(Participant::summary)
            .collect();
        roster.sort_by(|a, b| {
            (a.role == Role::Right, &a.id).cmp(&(b.role == Role::Right, &b.id))
        });
        roster
    }

    /// Lock the session for a dispatch.
    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock()
    }
}
