//! Named groups of actors for broadcast-style addressing.
//!
//! Membership is keyed by the actor's system-unique serial, so two actors
//! registered under the same key in different managers never collide.
//! Snapshots returned by [`GroupRegistry::actors_in_group`] are point-in-time:
//! an actor that is terminating concurrently may still appear in one.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::actor::handle::ActorRef;
use crate::actor::Behavior;
use crate::types::Key;

#[derive(Default)]
struct Membership {
    members: HashMap<Key, HashMap<u64, ActorRef>>,
    groups: HashMap<u64, HashSet<Key>>,
}

/// System-wide registry mapping group keys to member actors.
#[derive(Default)]
pub struct GroupRegistry {
    state: Mutex<Membership>,
}

impl GroupRegistry {
    /// Adds `actor` to `group`. Joining twice is a no-op.
    pub fn join(&self, group: impl Into<Key>, actor: &ActorRef) {
        let group = group.into();
        let mut state = self.state.lock();
        state
            .members
            .entry(group.clone())
            .or_default()
            .insert(actor.uid(), actor.clone());
        state.groups.entry(actor.uid()).or_default().insert(group);
    }

    /// Removes `actor` from `group`; unknown pairs are ignored.
    pub fn leave(&self, group: impl Into<Key>, actor: &ActorRef) {
        let group = group.into();
        let uid = actor.uid();
        let mut state = self.state.lock();
        if let Some(members) = state.members.get_mut(&group) {
            members.remove(&uid);
            if members.is_empty() {
                state.members.remove(&group);
            }
        }
        if let Some(groups) = state.groups.get_mut(&uid) {
            groups.remove(&group);
            if groups.is_empty() {
                state.groups.remove(&uid);
            }
        }
    }

    /// Removes `actor` from every group it joined.
    pub fn purge(&self, actor: &ActorRef) {
        let uid = actor.uid();
        let mut state = self.state.lock();
        let Some(groups) = state.groups.remove(&uid) else {
            return;
        };
        for group in groups {
            if let Some(members) = state.members.get_mut(&group) {
                members.remove(&uid);
                if members.is_empty() {
                    state.members.remove(&group);
                }
            }
        }
    }

    /// Current members of `group`; empty for an unknown group.
    pub fn actors_in_group(&self, group: impl Into<Key>) -> Vec<ActorRef> {
        self.state
            .lock()
            .members
            .get(&group.into())
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Groups `actor` currently belongs to.
    pub fn groups_of(&self, actor: &ActorRef) -> Vec<Key> {
        self.state
            .lock()
            .groups
            .get(&actor.uid())
            .map(|groups| groups.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Casts a clone of `msg` to every member of `group` running behavior `B`.
    ///
    /// Members of other behavior types, and members that stop while the
    /// broadcast is in flight, are skipped. Returns the number of deliveries.
    pub async fn broadcast<B>(&self, group: impl Into<Key>, msg: B::Message) -> usize
    where
        B: Behavior,
        B::Message: Clone,
    {
        let mut delivered = 0;
        for actor in self.actors_in_group(group) {
            let Some(handle) = actor.downcast::<B>() else {
                continue;
            };
            if handle.cast(msg.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}
