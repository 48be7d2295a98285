//! Shared type definitions used across the actor tree runtime.

use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Timeout used by [`ActorHandle::call_infinity`](crate::ActorHandle::call_infinity):
/// ten days, which is effectively unbounded for a request/reply exchange.
pub const INFINITY: Duration = Duration::from_secs(864_000);

/// Identifier of an actor inside its manager, or of a group in the
/// [`GroupRegistry`](crate::GroupRegistry).
///
/// Explicit keys are usually names; anonymous actors receive a generated
/// [`Key::Id`] from a process-wide monotonically increasing counter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// A caller-supplied name.
    Name(Arc<str>),
    /// A numeric key, either caller-supplied or generated.
    Id(u64),
}

impl Key {
    /// Returns the name when this is a [`Key::Name`].
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Key::Name(name) => Some(name),
            Key::Id(_) => None,
        }
    }

    /// Returns the number when this is a [`Key::Id`].
    pub fn as_id(&self) -> Option<u64> {
        match self {
            Key::Name(_) => None,
            Key::Id(id) => Some(*id),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Name(Arc::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Name(Arc::from(value.into_boxed_str()))
    }
}

impl From<&String> for Key {
    fn from(value: &String) -> Self {
        Key::Name(Arc::from(value.as_str()))
    }
}

impl From<Arc<str>> for Key {
    fn from(value: Arc<str>) -> Self {
        Key::Name(value)
    }
}

impl From<u64> for Key {
    fn from(value: u64) -> Self {
        Key::Id(value)
    }
}

impl From<&Key> for Key {
    fn from(value: &Key) -> Self {
        value.clone()
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Name(name) => write!(f, "{name}"),
            Key::Id(id) => write!(f, "{id}"),
        }
    }
}

/// Incrementing source for generated keys and actor serials. The first value is 1.
#[derive(Default)]
pub(crate) struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn next_key(&self) -> Key {
        Key::Id(self.next())
    }
}

/// Lifecycle status of an actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorStatus {
    /// Registered with its manager, task not yet running.
    Created,
    /// Running `init`.
    Initializing,
    /// Processing messages.
    Running,
    /// Running `terminate`.
    Terminating,
    /// Deregistered; the handle is inert.
    Terminated,
}

impl ActorStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ActorStatus::Created,
            1 => ActorStatus::Initializing,
            2 => ActorStatus::Running,
            3 => ActorStatus::Terminating,
            _ => ActorStatus::Terminated,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ActorStatus::Created => 0,
            ActorStatus::Initializing => 1,
            ActorStatus::Running => 2,
            ActorStatus::Terminating => 3,
            ActorStatus::Terminated => 4,
        }
    }
}

impl Display for ActorStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ActorStatus::Created => "created",
            ActorStatus::Initializing => "initializing",
            ActorStatus::Running => "running",
            ActorStatus::Terminating => "terminating",
            ActorStatus::Terminated => "terminated",
        };
        f.write_str(label)
    }
}

/// Status shared between an actor task and its handles.
#[derive(Debug)]
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(ActorStatus::Created.as_u8()))
    }

    pub fn get(&self) -> ActorStatus {
        ActorStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, status: ActorStatus) {
        self.0.store(status.as_u8(), Ordering::Release);
    }
}
