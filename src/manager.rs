//! Manager tree: registries of actors and child managers with a shared
//! cancellation scope.
//!
//! Every manager owns a [`CancellationToken`] derived from its parent's and a
//! [`TaskTracker`] that counts the actor tasks it started. A child manager
//! also holds a tracker token of its parent until it has stopped, so waiting
//! on a manager's tracker covers the whole subtree.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tokio_util::task::TaskTracker;

use crate::actor::handle::{ActorHandle, ActorRef};
use crate::actor::runtime::spawn_actor;
use crate::actor::{Behavior, IntoActorConfig};
use crate::error::{ActorError, ActorResult, ManagerError, SpawnError};
use crate::system::SystemShared;
use crate::types::Key;

pub(crate) struct ManagerInner {
    name: Arc<str>,
    parent: Option<Weak<ManagerInner>>,
    system: Arc<SystemShared>,
    children: DashMap<Arc<str>, Manager>,
    actors: DashMap<Key, ActorRef>,
    write_lock: Mutex<()>,
    token: CancellationToken,
    tracker: TaskTracker,
    active_actors: AtomicUsize,
    active_children: AtomicUsize,
    parent_slot: Mutex<Option<TaskTrackerToken>>,
}

/// A node of the manager tree. Cloning is cheap and yields the same node.
#[derive(Clone)]
pub struct Manager {
    inner: Arc<ManagerInner>,
}

impl Manager {
    pub(crate) fn root(name: &str, system: Arc<SystemShared>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                name: Arc::from(name),
                parent: None,
                system,
                children: DashMap::new(),
                actors: DashMap::new(),
                write_lock: Mutex::new(()),
                token: CancellationToken::new(),
                tracker: TaskTracker::new(),
                active_actors: AtomicUsize::new(0),
                active_children: AtomicUsize::new(0),
                parent_slot: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ManagerInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ManagerInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn system(&self) -> &Arc<SystemShared> {
        &self.inner.system
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    pub(crate) fn tracker(&self) -> &TaskTracker {
        &self.inner.tracker
    }

    /// Name of this manager, unique among its siblings.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The parent manager; `None` for the root or once the parent is gone.
    pub fn parent(&self) -> Option<Manager> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Manager::from_inner)
    }

    /// Number of actors currently registered here.
    pub fn active_actors(&self) -> usize {
        self.inner.active_actors.load(Ordering::Acquire)
    }

    /// Number of child managers that have not stopped yet.
    pub fn active_children(&self) -> usize {
        self.inner.active_children.load(Ordering::Acquire)
    }

    /// True once this manager or one of its ancestors began shutting down.
    pub fn is_stopping(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Creates a child manager named `name`.
    ///
    /// # Errors
    /// - [`ManagerError::AlreadyExists`] with the existing child if the name is taken.
    /// - [`ManagerError::Stopped`] if this manager is shutting down.
    pub fn create_child(&self, name: impl Into<Arc<str>>) -> Result<Manager, ManagerError> {
        let name = name.into();
        let _guard = self.inner.write_lock.lock();
        if self.is_stopping() {
            return Err(ManagerError::Stopped(Arc::clone(&self.inner.name)));
        }
        if let Some(existing) = self.inner.children.get(&name) {
            return Err(ManagerError::AlreadyExists(existing.value().clone()));
        }

        let child = Manager {
            inner: Arc::new(ManagerInner {
                name: Arc::clone(&name),
                parent: Some(Arc::downgrade(&self.inner)),
                system: Arc::clone(&self.inner.system),
                children: DashMap::new(),
                actors: DashMap::new(),
                write_lock: Mutex::new(()),
                token: self.inner.token.child_token(),
                tracker: TaskTracker::new(),
                active_actors: AtomicUsize::new(0),
                active_children: AtomicUsize::new(0),
                parent_slot: Mutex::new(Some(self.inner.tracker.token())),
            }),
        };
        self.inner.children.insert(name, child.clone());
        self.inner.active_children.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(parent = %self.name(), manager = %child.name(), "manager created");
        Ok(child)
    }

    /// Looks up a direct child manager by name.
    pub fn child(&self, name: &str) -> Option<Manager> {
        self.inner
            .children
            .get(name)
            .map(|entry| entry.value().clone())
    }

    /// Spawns `behavior` under `key` with the system's default config.
    ///
    /// Resolves once `init` has finished. A taken key yields
    /// [`SpawnError::AlreadyExists`] carrying the running actor, and `behavior`
    /// is dropped without being started.
    pub async fn spawn<B: Behavior>(
        &self,
        key: impl Into<Key>,
        behavior: B,
    ) -> Result<ActorHandle<B>, SpawnError> {
        self.spawn_with(Some(key.into()), behavior, ()).await
    }

    /// Spawns `behavior` under a freshly generated [`Key::Id`].
    ///
    /// Ids come from a system-wide counter starting at 1 that does not look
    /// at explicit keys. An actor spawned with an explicit `Key::Id` can
    /// therefore take an id the counter hands out later, and that anonymous
    /// spawn fails with [`SpawnError::AlreadyExists`]. Use [`Key::Name`] for
    /// explicit keys when both forms share a manager.
    pub async fn spawn_anonymous<B: Behavior>(
        &self,
        behavior: B,
    ) -> Result<ActorHandle<B>, SpawnError> {
        self.spawn_with(None, behavior, ()).await
    }

    /// Spawns `behavior` with an explicit config; `None` as key generates one.
    pub async fn spawn_with<B: Behavior>(
        &self,
        key: Option<Key>,
        behavior: B,
        config: impl IntoActorConfig,
    ) -> Result<ActorHandle<B>, SpawnError> {
        let config = config.into_config(&self.inner.system.actor_defaults);
        spawn_actor(self, key, behavior, config).await
    }

    /// Finds the actor registered under `key`.
    pub fn lookup(&self, key: impl Into<Key>) -> Option<ActorRef> {
        self.inner
            .actors
            .get(&key.into())
            .map(|entry| entry.value().clone())
    }

    /// Finds the actor registered under `key` and recovers its typed handle.
    ///
    /// # Errors
    /// [`ErrorCode::NotFound`](crate::ErrorCode::NotFound) if nothing is
    /// registered under `key` or the actor runs a different behavior.
    pub fn lookup_as<B: Behavior>(&self, key: impl Into<Key>) -> ActorResult<ActorHandle<B>> {
        let key = key.into();
        self.lookup(key.clone())
            .and_then(|actor| actor.downcast::<B>())
            .ok_or_else(|| {
                ActorError::not_found()
                    .with_detail(format!("no actor `{key}` of that type in `{}`", self.name()))
            })
    }

    /// Visits a snapshot of the registered actors until `visitor` breaks.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&Key, &ActorRef) -> ControlFlow<()>,
    {
        let snapshot: Vec<(Key, ActorRef)> = self
            .inner
            .actors
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        for (key, actor) in &snapshot {
            if visitor(key, actor).is_break() {
                break;
            }
        }
    }

    /// Visits a snapshot of the child managers until `visitor` breaks.
    pub fn for_each_child<F>(&self, mut visitor: F)
    where
        F: FnMut(&Manager) -> ControlFlow<()>,
    {
        let snapshot: Vec<Manager> = self
            .inner
            .children
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for child in &snapshot {
            if visitor(child).is_break() {
                break;
            }
        }
    }

    /// Stops every actor and manager below this one, then detaches from the parent.
    ///
    /// Running actors observe the cancellation at their next scheduling point
    /// and terminate with [`ErrorCode::CancelledByContext`](crate::ErrorCode::CancelledByContext).
    /// Resolves once every descendant actor has finished `terminate` and
    /// deregistered. Calling it again on a stopped manager returns at once.
    ///
    /// Awaiting this from an actor inside the subtree never resolves: the
    /// actor cannot reach its cancellation point while its handler waits for
    /// itself to stop. Run it on a detached task instead:
    ///
    /// ```ignore
    /// let manager = ctx.manager().clone();
    /// tokio::spawn(async move { manager.stop_all(ActorError::normal_stop()).await });
    /// ```
    pub async fn stop_all(&self, reason: ActorError) {
        tracing::info!(
            manager = %self.name(),
            actors = self.active_actors(),
            children = self.active_children(),
            reason = %reason,
            "stopping manager"
        );
        self.shutdown().await;
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            {
                let _guard = self.inner.write_lock.lock();
                self.inner.token.cancel();
            }

            let children: Vec<Manager> = self
                .inner
                .children
                .iter()
                .map(|entry| entry.value().clone())
                .collect();
            join_all(children.iter().map(Manager::shutdown)).await;

            self.inner.tracker.close();
            self.inner.tracker.wait().await;
            self.detach();
            tracing::debug!(manager = %self.name(), "manager stopped");
        })
    }

    /// Leaves the parent's registry and releases the parent's tracker token.
    fn detach(&self) {
        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
        self.inner.parent_slot.lock().take();
    }

    pub(crate) fn remove_child(&self, child: &Manager) {
        let _guard = self.inner.write_lock.lock();
        let removed = self
            .inner
            .children
            .remove_if(child.name(), |_, current| Arc::ptr_eq(&current.inner, &child.inner));
        if removed.is_some() {
            self.inner.active_children.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Adds `actor` to the registry unless its key is taken or this manager is stopping.
    ///
    /// The returned token keeps the completion tracker open until the actor's
    /// task has been handed to it.
    pub(crate) fn register(&self, actor: ActorRef) -> Result<TaskTrackerToken, SpawnError> {
        let _guard = self.inner.write_lock.lock();
        if self.is_stopping() {
            return Err(SpawnError::Failed(
                ActorError::closed().with_detail(format!("manager `{}` is stopping", self.name())),
            ));
        }
        match self.inner.actors.entry(actor.key().clone()) {
            Entry::Occupied(existing) => Err(SpawnError::AlreadyExists(existing.get().clone())),
            Entry::Vacant(slot) => {
                slot.insert(actor);
                self.inner.active_actors.fetch_add(1, Ordering::AcqRel);
                Ok(self.inner.tracker.token())
            }
        }
    }

    /// Removes `actor` if its key still maps to it.
    pub(crate) fn deregister(&self, actor: &ActorRef) {
        let _guard = self.inner.write_lock.lock();
        let removed = self
            .inner
            .actors
            .remove_if(actor.key(), |_, current| current.uid() == actor.uid());
        if removed.is_some() {
            self.inner.active_actors.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl PartialEq for Manager {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Manager {}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("name", &self.inner.name)
            .field("actors", &self.active_actors())
            .field("children", &self.active_children())
            .field("stopping", &self.is_stopping())
            .finish()
    }
}

impl fmt::Display for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}
