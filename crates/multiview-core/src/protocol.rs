//! Participant wire protocol.
//!
//! Inbound frames are JSON objects carrying a `senderId` and an `action` tag.
//! Relays sent to the other participants are the same object without
//! `senderId`. Decoding happens in two steps because the sender must be
//! validated before the action is looked at:
//!
//! 1. [`Inbound::parse`] reads the JSON and extracts `senderId`
//! 2. [`Inbound::into_action`] decodes the typed [`Action`]

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::errors::DispatchError;

/// Plain-text notice sent back when `senderId` is not a participant.
pub const INVALID_SENDER: &str = "Invalid sender";

/// Plain-text notice sent back when `action` is not recognized.
pub const INVALID_ACTION: &str = "Invalid action";

/// Side of the shared playfield a participant owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// First participant admitted to a session.
    Left,
    /// Every participant admitted after the first.
    Right,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position and velocity of the ball when it leaves a participant's view.
///
/// The four coordinates are required. Their values keep the JSON number
/// representation they arrived with (`1` stays `1`, not `1.0`), and any other
/// keys are relayed untouched in `extra`. Keys are re-emitted in sorted order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Horizontal position.
    pub x: Number,
    /// Vertical position.
    pub y: Number,
    /// Horizontal velocity.
    pub dx: Number,
    /// Vertical velocity.
    pub dy: Number,
    /// Keys beyond the coordinates.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A recognized participant action.
///
/// Serializes to the relay payload sent to the other participants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Action {
    /// Start the round.
    Start,
    /// Stop the round.
    Stop,
    /// A point was scored.
    Score {
        /// Side that won the point.
        winner: Role,
    },
    /// The ball left the sender's view.
    Over {
        /// Ball state at the moment it left.
        message: Snapshot,
    },
}

impl Action {
    /// Every action tag the router understands.
    pub const KINDS: [&'static str; 4] = ["start", "stop", "score", "over"];

    /// Wire tag of this action.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Score { .. } => "score",
            Self::Over { .. } => "over",
        }
    }

    /// Serialize the relay payload.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A parsed inbound frame whose sender has not been validated yet.
#[derive(Clone, Debug)]
pub struct Inbound {
    sender_id: Option<String>,
    body: Value,
}

impl Inbound {
    /// Parse raw frame text.
    ///
    /// Only fails on invalid JSON. A missing or non-string `senderId` is
    /// reported as `None` so the router can answer with [`INVALID_SENDER`].
    pub fn parse(raw: &str) -> Result<Self, DispatchError> {
        let body: Value = serde_json::from_str(raw)?;
        let sender_id = body
            .get("senderId")
            .and_then(Value::as_str)
            .map(str::to_owned);
        Ok(Self { sender_id, body })
    }

    /// The claimed sender, if present.
    pub fn sender_id(&self) -> Option<&str> {
        self.sender_id.as_deref()
    }

    /// The raw `action` tag, if present and a string.
    pub fn action_name(&self) -> Option<&str> {
        self.body.get("action").and_then(Value::as_str)
    }

    /// Decode the typed action.
    ///
    /// Unknown or missing tags yield [`DispatchError::InvalidAction`]; a known
    /// tag with a bad payload yields [`DispatchError::Malformed`].
    pub fn into_action(self) -> Result<Action, DispatchError> {
        let known = self
            .action_name()
            .is_some_and(|name| Action::KINDS.contains(&name));
        if !known {
            let action = self.action_name().unwrap_or_default().to_owned();
            return Err(DispatchError::InvalidAction { action });
        }
        Ok(serde_json::from_value(self.body)?)
    }
}
