//! `roomnet_client`
//!
//! Client-side session layer for the room server:
//! - Connection management (one TCP stream, background line reader)
//! - Inbound dispatch on a single consumer context
//! - Roster reconciliation against server snapshots and move updates
//! - Presentation bridge trait for whatever draws the players
//! - A small line console used by the `client` binary

pub mod bridge;
pub mod connection;
pub mod console;
pub mod error;
pub mod roster;
pub mod session;

pub use bridge::PresentationBridge;
pub use connection::{ConnectionState, Inbound};
pub use error::{ConnectError, SendError};
pub use roster::{RemoteEntity, Roster, RosterDiff};
pub use session::Session;
