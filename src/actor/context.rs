//! Actor execution context handed to every behavior hook.

use std::fmt;
use std::sync::Arc;

use crate::actor::{handle::ActorHandle, Behavior};
use crate::error::ActorResult;
use crate::group::GroupRegistry;
use crate::manager::Manager;
use crate::system::SystemShared;
use crate::types::{ActorStatus, Key};

/// Actor execution context.
///
/// The context is passed to `init`, `handle_msg` and `terminate` and provides access to:
/// - The actor's key
/// - A handle to the actor itself (for casting to self or handing out to peers)
/// - The owning manager (for spawning siblings or looking them up)
/// - The group registry and the log sink
pub struct ActorContext<B: Behavior> {
    self_handle: ActorHandle<B>,
    manager: Manager,
}

impl<B: Behavior> ActorContext<B> {
    pub(crate) fn new(self_handle: ActorHandle<B>, manager: Manager) -> Self {
        Self {
            self_handle,
            manager,
        }
    }

    /// Returns the key this actor is registered under.
    pub fn key(&self) -> &Key {
        self.self_handle.key()
    }

    /// Returns a handle to this actor.
    ///
    /// Casting to self is fine while the mailbox has room; calling self deadlocks.
    pub fn self_handle(&self) -> ActorHandle<B> {
        self.self_handle.clone()
    }

    /// Returns the manager that owns this actor.
    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    /// Returns the current lifecycle status of the actor.
    pub fn status(&self) -> ActorStatus {
        self.self_handle.status()
    }

    /// The system-wide group registry.
    pub fn groups(&self) -> &GroupRegistry {
        &self.system().groups
    }

    /// Adds this actor to `group`.
    pub fn join_group(&self, group: impl Into<Key>) -> ActorResult<()> {
        self.self_handle.join_group(group)
    }

    /// Removes this actor from `group`.
    pub fn leave_group(&self, group: impl Into<Key>) {
        self.self_handle.leave_group(group);
    }

    /// Writes an error record to the system's log sink.
    pub fn log_error(&self, record: fmt::Arguments<'_>) {
        self.system().log_error(record);
    }

    pub(crate) fn system(&self) -> &Arc<SystemShared> {
        &self.self_handle.shared().system
    }

    pub(crate) fn set_status(&self, status: ActorStatus) {
        self.self_handle.shared().status.set(status);
    }
}
