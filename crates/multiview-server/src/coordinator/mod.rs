//! Session coordination: the roster of each session, the directory of
//! sessions, and inbound message dispatch.

pub mod registry;
pub mod router;
pub mod session;

pub use registry::SessionRegistry;
pub use router::{Relayed, dispatch};
pub use session::{Admission, MAX_PARTICIPANTS, Participant, ParticipantSummary, Session};
