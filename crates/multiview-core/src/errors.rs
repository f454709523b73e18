//! Error types for admission and message dispatch.
//!
//! Both are recoverable at the boundary:
//!
//! - [`AdmissionError`] rejects a connection attempt before any session
//!   state changes. Its `Display` text is the reason returned to the client.
//! - [`DispatchError`] aborts the handling of a single inbound message.
//!   [`DispatchError::notice`] says what (if anything) is sent back to the
//!   source connection.

use thiserror::Error;

use crate::protocol::{INVALID_ACTION, INVALID_SENDER};

/// Why a connection attempt was refused.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// No participant id was supplied, or it was empty.
    #[error("Invalid id")]
    MissingIdentifier,
    /// The session already holds its two participants.
    #[error("Too many users")]
    SessionFull,
}

impl AdmissionError {
    /// Machine-readable reason, used as a metric label.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingIdentifier => "missing_identifier",
            Self::SessionFull => "session_full",
        }
    }
}

/// Why an inbound message was not relayed.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// `senderId` is missing or not a participant of the session.
    #[error("unknown sender '{sender}'")]
    InvalidSender {
        /// The claimed sender (empty when absent).
        sender: String,
    },
    /// `action` is missing or not one of the known tags.
    #[error("unknown action '{action}'")]
    InvalidAction {
        /// The received tag (empty when absent).
        action: String,
    },
    /// The frame is not valid JSON, or a known action has a bad payload.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl DispatchError {
    /// Machine-readable kind, used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidSender { .. } => "invalid_sender",
            Self::InvalidAction { .. } => "invalid_action",
            Self::Malformed(_) => "malformed",
        }
    }

    /// Plain-text notice for the source connection, if any.
    ///
    /// Malformed frames are dropped silently.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            Self::InvalidSender { .. } => Some(INVALID_SENDER),
            Self::InvalidAction { .. } => Some(INVALID_ACTION),
            Self::Malformed(_) => None,
        }
    }
}
