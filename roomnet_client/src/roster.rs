//! Roster reconciliation.
//!
//! The roster is the client's view of which players are in the room and
//! where they are. Membership is owned by full snapshots (`update_room_info`):
//! each snapshot is diffed against the current roster, stale ids are removed
//! and new ids added. Positions of known players are owned by move updates.
//! A snapshot never repositions an entity that already exists, and a move
//! never creates one.
//!
//! Every effect is forwarded to the [`PresentationBridge`] in the same order
//! it is recorded in the returned [`RosterDiff`].

use std::collections::{btree_map::Entry, BTreeMap, HashSet};
use std::fmt;

use roomnet_shared::{math::Vec3, protocol::AnimationIntent};
use tracing::debug;

use crate::bridge::PresentationBridge;

/// A player known to the roster.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEntity {
    pub id: String,
    pub position: Vec3,
    /// Last animation parameters reported for this player, if any.
    pub animation: Option<AnimationIntent>,
}

/// Effects of one roster operation, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterDiff {
    pub removed: Vec<String>,
    pub added: Vec<String>,
    pub moved: Vec<String>,
}

impl RosterDiff {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.moved.is_empty()
    }
}

/// Authoritative set of remote entities.
pub struct Roster {
    entities: BTreeMap<String, RemoteEntity>,
    bridge: Box<dyn PresentationBridge + Send>,
}

impl Roster {
    pub fn new(bridge: impl PresentationBridge + Send + 'static) -> Self {
        Self {
            entities: BTreeMap::new(),
            bridge: Box::new(bridge),
        }
    }

    /// Reconciles membership against a full snapshot.
    ///
    /// Ids missing from `entries` are removed first (in id order), then ids
    /// not yet known are added in snapshot order at their listed position.
    /// When an id is listed twice, its first entry wins.
    pub fn apply_snapshot<I, S>(&mut self, entries: I) -> RosterDiff
    where
        I: IntoIterator<Item = (S, Vec3)>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut incoming = Vec::new();
        for (id, position) in entries {
            let id = id.into();
            if seen.insert(id.clone()) {
                incoming.push((id, position));
            }
        }

        let mut diff = RosterDiff::default();

        let stale: Vec<String> = self
            .entities
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        for id in stale {
            self.entities.remove(&id);
            self.bridge.on_entity_removed(&id);
            diff.removed.push(id);
        }

        for (id, position) in incoming {
            if let Entry::Vacant(slot) = self.entities.entry(id.clone()) {
                slot.insert(RemoteEntity {
                    id: id.clone(),
                    position,
                    animation: None,
                });
                self.bridge.on_entity_added(&id, position);
                diff.added.push(id);
            }
        }

        debug!(
            removed = diff.removed.len(),
            added = diff.added.len(),
            total = self.entities.len(),
            "Applied roster snapshot"
        );
        diff
    }

    /// Updates the position of a known entity. Unknown ids are ignored.
    ///
    /// `animation` replaces the stored intent only when present.
    pub fn apply_move(
        &mut self,
        id: &str,
        position: Vec3,
        animation: Option<AnimationIntent>,
    ) -> RosterDiff {
        let mut diff = RosterDiff::default();
        let Some(entity) = self.entities.get_mut(id) else {
            debug!(player_id = %id, "Move for unknown player ignored");
            return diff;
        };
        entity.position = position;
        if animation.is_some() {
            entity.animation = animation;
        }
        self.bridge.on_entity_moved(id, position, entity.animation);
        diff.moved.push(id.to_string());
        diff
    }

    /// Adds a single entity if it is not known yet.
    pub fn apply_join(&mut self, id: &str, position: Vec3) -> RosterDiff {
        let mut diff = RosterDiff::default();
        if let Entry::Vacant(slot) = self.entities.entry(id.to_string()) {
            slot.insert(RemoteEntity {
                id: id.to_string(),
                position,
                animation: None,
            });
            self.bridge.on_entity_added(id, position);
            diff.added.push(id.to_string());
        }
        diff
    }

    /// Removes a single entity if it is known.
    pub fn apply_leave(&mut self, id: &str) -> RosterDiff {
        let mut diff = RosterDiff::default();
        if self.entities.remove(id).is_some() {
            self.bridge.on_entity_removed(id);
            diff.removed.push(id.to_string());
        } else {
            debug!(player_id = %id, "Leave for unknown player ignored");
        }
        diff
    }

    /// Removes every entity, then tells the bridge the roster is empty.
    pub fn clear_all(&mut self) -> RosterDiff {
        let mut diff = RosterDiff::default();
        for id in std::mem::take(&mut self.entities).into_keys() {
            self.bridge.on_entity_removed(&id);
            diff.removed.push(id);
        }
        self.bridge.on_roster_cleared();
        diff
    }

    pub fn get(&self, id: &str) -> Option<&RemoteEntity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    /// Known ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl fmt::Debug for Roster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Roster")
            .field("entities", &self.entities)
            .finish_non_exhaustive()
    }
}
