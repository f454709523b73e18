//! # multiview-core
//!
//! Foundation types shared by the multiview crates:
//!
//! - **Protocol**: [`protocol::Role`], [`protocol::Action`] and the inbound
//!   frame decoder used by the message router
//! - **Errors**: [`errors::AdmissionError`] and [`errors::DispatchError`]
//!   via `thiserror`
//! - **IDs**: [`ids::ConnectionId`], a time-ordered UUID newtype
//! - **Logging**: `tracing-subscriber` initialization and a log capture
//!   layer for tests

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod protocol;

pub use errors::{AdmissionError, DispatchError};
pub use ids::ConnectionId;
pub use protocol::{Action, Inbound, Role, Snapshot};
