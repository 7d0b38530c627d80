//! `roomnet_shared`
//!
//! Types shared by the room-session client and its tests.
//!
//! Design goals:
//! - No I/O; everything here is pure data or pure functions.
//! - One JSON object per line on the wire, tagged by `type`.
//! - No `unsafe`.

pub mod config;
pub mod event;
pub mod math;
pub mod protocol;
