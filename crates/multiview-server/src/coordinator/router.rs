//! Inbound message dispatch.
//!
//! A message is parsed, its sender is checked against the roster, and the
//! action is relayed to every other live connection of the session. Rejected
//! messages never touch session state; the source may get a plain-text
//! notice back.

use std::sync::Arc;

use metrics::counter;
use multiview_core::protocol::{Action, Inbound};
use multiview_core::DispatchError;
use tracing::{debug, warn};

use super::session::Session;
use crate::metrics::{DISPATCH_ERRORS_TOTAL, MESSAGES_RELAYED_TOTAL, RELAY_DROPS_TOTAL};
use crate::websocket::connection::ClientConnection;

/// Result of relaying one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relayed {
    /// Wire tag of the relayed action.
    pub action: &'static str,
    /// Peers whose queue accepted the relay.
    pub delivered: usize,
    /// Peers whose queue was full or closed.
    pub dropped: usize,
}

/// Handle one inbound frame from `source`.
///
/// On rejection the matching notice (if any) is queued for `source` and the
/// error is returned for the caller's logs.
pub fn dispatch(
    session: &Session,
    raw: &str,
    source: &ClientConnection,
) -> Result<Relayed, DispatchError> {
    let result = route(session, raw, source);

    if let Err(err) = &result {
        counter!(DISPATCH_ERRORS_TOTAL, "kind" => err.kind()).increment(1);
        match err.notice() {
            Some(notice) => {
                debug!(session = session.name(), error = %err, "rejecting message");
                if !source.notice(notice) {
                    warn!(connection = %source.id, "failed to enqueue notice (channel full or closed)");
                }
            }
            None => warn!(session = session.name(), error = %err, "dropping malformed message"),
        }
    }

    result
}

fn route(
    session: &Session,
    raw: &str,
    source: &ClientConnection,
) -> Result<Relayed, DispatchError> {
    let inbound = Inbound::parse(raw)?;
    let mut state = session.lock();

    let sender = match inbound.sender_id() {
        Some(id) if state.lookup(id).is_some() => id.to_owned(),
        other => {
            return Err(DispatchError::InvalidSender {
                sender: other.unwrap_or_default().to_owned(),
            });
        }
    };

    let action = inbound.into_action()?;
    if let Action::Over { .. } = action {
        state.mark_inactive(&sender);
    }

    let payload = Arc::new(action.to_json()?);
    let mut relayed = Relayed {
        action: action.kind(),
        delivered: 0,
        dropped: 0,
    };
    for peer in state.peers(&source.id) {
        if peer.send_text(payload.clone()) {
            relayed.delivered += 1;
        } else {
            relayed.dropped += 1;
            counter!(RELAY_DROPS_TOTAL).increment(1);
            warn!(
                session = session.name(),
                peer = %peer.id,
                action = relayed.action,
                "relay dropped (channel full or closed)"
            );
        }
    }

    counter!(MESSAGES_RELAYED_TOTAL, "action" => relayed.action).increment(1);
    debug!(
        session = session.name(),
        sender = %sender,
        action = relayed.action,
        delivered = relayed.delivered,
        dropped = relayed.dropped,
        "message relayed"
    );
    Ok(relayed)
}
