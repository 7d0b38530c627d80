//! Presentation bridge.
//!
//! The roster calls into a [`PresentationBridge`] whenever an entity appears,
//! moves or disappears. Engines implement it to spawn, interpolate and destroy
//! their visual representations; the session layer never looks back at what
//! the bridge did.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use roomnet_shared::{math::Vec3, protocol::AnimationIntent};
use tracing::info;

/// Receives roster changes. Every method defaults to doing nothing.
pub trait PresentationBridge {
    fn on_entity_added(&mut self, _id: &str, _position: Vec3) {}

    /// `position` is the new interpolation target.
    fn on_entity_moved(
        &mut self,
        _id: &str,
        _position: Vec3,
        _animation: Option<AnimationIntent>,
    ) {
    }

    fn on_entity_removed(&mut self, _id: &str) {}

    /// Called once after every entity of a clear has been removed.
    fn on_roster_cleared(&mut self) {}
}

/// Bridge that ignores every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBridge;

impl PresentationBridge for NullBridge {}

/// Bridge that reports roster changes through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingBridge;

impl PresentationBridge for LoggingBridge {
    fn on_entity_added(&mut self, id: &str, position: Vec3) {
        info!(player_id = %id, %position, "Player spawned");
    }

    fn on_entity_moved(&mut self, id: &str, position: Vec3, _animation: Option<AnimationIntent>) {
        tracing::trace!(player_id = %id, %position, "Player moved");
    }

    fn on_entity_removed(&mut self, id: &str) {
        info!(player_id = %id, "Player removed");
    }

    fn on_roster_cleared(&mut self) {
        info!("Roster cleared");
    }
}

/// One bridge call as seen by a [`RecordingBridge`].
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCall {
    Added(String, Vec3),
    Moved(String, Vec3),
    Removed(String),
    Cleared,
}

/// Bridge that appends every call to a shared log.
///
/// Clones share the same log, so a test can hand one clone to the session and
/// keep another to inspect.
#[derive(Debug, Default, Clone)]
pub struct RecordingBridge {
    calls: Arc<Mutex<Vec<BridgeCall>>>,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, Vec<BridgeCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every call recorded so far.
    pub fn calls(&self) -> Vec<BridgeCall> {
        self.log().clone()
    }

    /// Removes and returns the recorded calls.
    pub fn take(&self) -> Vec<BridgeCall> {
        std::mem::take(&mut *self.log())
    }
}

impl PresentationBridge for RecordingBridge {
    fn on_entity_added(&mut self, id: &str, position: Vec3) {
        self.log().push(BridgeCall::Added(id.to_string(), position));
    }

    fn on_entity_moved(&mut self, id: &str, position: Vec3, _animation: Option<AnimationIntent>) {
        self.log().push(BridgeCall::Moved(id.to_string(), position));
    }

    fn on_entity_removed(&mut self, id: &str) {
        self.log().push(BridgeCall::Removed(id.to_string()));
    }

    fn on_roster_cleared(&mut self) {
        self.log().push(BridgeCall::Cleared);
    }
}
