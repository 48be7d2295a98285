//! Handle-based communication API for actors.

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, Mutex, MutexGuard};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::actor::exec::{ExecFn, ExecValue};
use crate::actor::{Behavior, Envelope, ExecOutput, ExecTask};
use crate::error::{ActorError, ActorResult, ErrorCode, TrySendError};
use crate::manager::{Manager, ManagerInner};
use crate::system::SystemShared;
use crate::types::{ActorStatus, Key, StatusCell, INFINITY};

/// State shared between an actor task and all of its handles.
pub(crate) struct ActorShared<B: Behavior> {
    pub(crate) key: Key,
    pub(crate) uid: u64,
    pub(crate) tx: mpsc::Sender<Envelope<B>>,
    pub(crate) mailbox_capacity: usize,
    pub(crate) behavior: Arc<Mutex<B>>,
    pub(crate) status: StatusCell,
    pub(crate) terminated: CancellationToken,
    pub(crate) system: Arc<SystemShared>,
    pub(crate) manager: Weak<ManagerInner>,
}

/// Cloneable handle that callers use to communicate with an actor.
pub struct ActorHandle<B: Behavior> {
    shared: Arc<ActorShared<B>>,
}

impl<B: Behavior> Clone for ActorHandle<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: Behavior> PartialEq for ActorHandle<B> {
    fn eq(&self, other: &Self) -> bool {
        self.shared.uid == other.shared.uid
    }
}

impl<B: Behavior> Eq for ActorHandle<B> {}

impl<B: Behavior> std::hash::Hash for ActorHandle<B> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.shared.uid.hash(state);
    }
}

impl<B: Behavior> fmt::Debug for ActorHandle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorHandle")
            .field("key", &self.shared.key)
            .field("status", &self.shared.status.get())
            .finish()
    }
}

impl<B: Behavior> ActorHandle<B> {
    pub(crate) fn from_shared(shared: Arc<ActorShared<B>>) -> Self {
        Self { shared }
    }

    pub(crate) fn shared(&self) -> &ActorShared<B> {
        &self.shared
    }

    /// Returns the key the actor is registered under.
    pub fn key(&self) -> &Key {
        &self.shared.key
    }

    /// Returns the current lifecycle status.
    pub fn status(&self) -> ActorStatus {
        self.shared.status.get()
    }

    /// Returns the total capacity of the actor's mailbox.
    pub fn mailbox_capacity(&self) -> usize {
        self.shared.mailbox_capacity
    }

    /// Returns the current number of messages in the mailbox.
    pub fn mailbox_len(&self) -> usize {
        self.shared.mailbox_capacity - self.shared.tx.capacity()
    }

    /// Returns the number of available slots in the mailbox.
    pub fn mailbox_available(&self) -> usize {
        self.shared.tx.capacity()
    }

    /// Returns true while the mailbox still accepts messages.
    pub fn is_alive(&self) -> bool {
        !self.shared.tx.is_closed()
    }

    /// The manager the actor belongs to, unless that manager is gone.
    pub fn manager(&self) -> Option<Manager> {
        self.shared.manager.upgrade().map(Manager::from_inner)
    }

    /// Read access to the behavior from outside the actor's task.
    ///
    /// All mutation must go through [`cast`](Self::cast), [`call`](Self::call)
    /// or an exec.
    pub fn behavior(&self) -> BehaviorRef<B> {
        BehaviorRef {
            cell: Arc::clone(&self.shared.behavior),
        }
    }

    /// Type-erased reference to this actor.
    pub fn to_ref(&self) -> ActorRef {
        ActorRef {
            inner: Arc::clone(&self.shared) as Arc<dyn ManagedActor>,
        }
    }

    /// Sends a message without waiting for a reply (fire-and-forget).
    ///
    /// This method awaits if the mailbox is full; messages are never dropped.
    ///
    /// # Errors
    /// Returns [`ErrorCode::Closed`] if the actor has stopped.
    pub async fn cast(&self, msg: B::Message) -> ActorResult<()> {
        self.enqueue(Envelope::Message {
            payload: msg,
            responder: None,
        })
        .await
    }

    /// Attempts to send a message without waiting for capacity.
    ///
    /// # Errors
    /// - `TrySendError::Full` if the mailbox is full.
    /// - `TrySendError::Closed` if the actor has stopped.
    pub fn try_cast(&self, msg: B::Message) -> Result<(), TrySendError> {
        self.shared
            .tx
            .try_send(Envelope::Message {
                payload: msg,
                responder: None,
            })
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => TrySendError::Full,
                mpsc::error::TrySendError::Closed(_) => TrySendError::Closed,
            })
    }

    /// Sends a message and waits up to `timeout` for the reply.
    ///
    /// On expiry the caller gets [`ErrorCode::Timeout`]; the actor still
    /// processes the message and its late reply is discarded.
    ///
    /// Never call an actor from its own task: it would wait on itself.
    pub async fn call(&self, msg: B::Message, timeout: Duration) -> ActorResult<B::Reply> {
        let (tx, rx) = oneshot::channel();
        let envelope = Envelope::Message {
            payload: msg,
            responder: Some(tx),
        };
        self.request(envelope, rx, timeout).await
    }

    /// [`call`](Self::call) with an effectively unbounded timeout.
    pub async fn call_infinity(&self, msg: B::Message) -> ActorResult<B::Reply> {
        self.call(msg, INFINITY).await
    }

    /// Runs `f` on the actor's task, in mailbox order, and waits up to `timeout` for its result.
    pub async fn exec<F, R>(&self, f: F, timeout: Duration) -> ActorResult<R>
    where
        F: FnOnce(&mut B) -> R + Send + 'static,
        R: Send + 'static,
    {
        let task: ExecTask<B> =
            Box::new(move |behavior: &mut B| Ok(Box::new(f(behavior)) as ExecOutput));
        let output = self.exec_task(task, timeout).await?;
        output
            .downcast::<R>()
            .map(|value| *value)
            .map_err(|_| unexpected_output())
    }

    /// Queues `f` to run on the actor's task without waiting for it.
    pub async fn exec_cast<F>(&self, f: F) -> ActorResult<()>
    where
        F: FnOnce(&mut B) + Send + 'static,
    {
        let task: ExecTask<B> = Box::new(move |behavior: &mut B| {
            f(behavior);
            Ok(Box::new(()) as ExecOutput)
        });
        self.enqueue(Envelope::Exec {
            task,
            responder: None,
        })
        .await
    }

    /// Invokes `target` with `args` on the actor's task and waits up to
    /// `timeout` for the returned values.
    ///
    /// # Errors
    /// [`ErrorCode::ParameterCountMismatch`] or [`ErrorCode::RpcFailed`] when the
    /// arguments do not fit `target`; the mailbox is left untouched in that case.
    pub async fn sync_exec(
        &self,
        target: &ExecFn<B>,
        timeout: Duration,
        args: Vec<ExecValue>,
    ) -> ActorResult<Vec<ExecValue>> {
        let task = target.bind(args)?;
        let output = self.exec_task(task, timeout).await?;
        output
            .downcast::<Vec<ExecValue>>()
            .map(|values| *values)
            .map_err(|_| unexpected_output())
    }

    /// Queues `target` with `args` without waiting; results are discarded.
    ///
    /// Validation is the same as [`sync_exec`](Self::sync_exec).
    pub async fn async_exec(&self, target: &ExecFn<B>, args: Vec<ExecValue>) -> ActorResult<()> {
        let task = target.bind(args)?;
        self.enqueue(Envelope::Exec {
            task,
            responder: None,
        })
        .await
    }

    /// Asks the actor to stop with `reason` once earlier messages are processed.
    ///
    /// Does not wait for termination; use [`terminated`](Self::terminated) for that.
    pub async fn stop(&self, reason: ActorError) -> ActorResult<()> {
        self.enqueue(Envelope::Stop(reason)).await
    }

    /// Resolves once the actor has run `terminate` and left its manager.
    pub async fn terminated(&self) {
        self.shared.terminated.cancelled().await;
    }

    /// Adds the actor to `group`. Joining twice is a no-op.
    ///
    /// # Errors
    /// [`ErrorCode::Closed`] if the actor is no longer alive.
    pub fn join_group(&self, group: impl Into<Key>) -> ActorResult<()> {
        let group = group.into();
        let actor = self.to_ref();
        let groups = &self.shared.system.groups;
        groups.join(group.clone(), &actor);
        if !self.is_alive() {
            // Termination may have purged before the join landed.
            groups.leave(group, &actor);
            return Err(self.closed_error());
        }
        Ok(())
    }

    /// Removes the actor from `group`.
    pub fn leave_group(&self, group: impl Into<Key>) {
        self.shared.system.groups.leave(group, &self.to_ref());
    }

    async fn enqueue(&self, envelope: Envelope<B>) -> ActorResult<()> {
        self.shared
            .tx
            .send(envelope)
            .await
            .map_err(|_| self.closed_error())
    }

    async fn exec_task(&self, task: ExecTask<B>, timeout: Duration) -> ActorResult<ExecOutput> {
        let (tx, rx) = oneshot::channel();
        let envelope = Envelope::Exec {
            task,
            responder: Some(tx),
        };
        self.request(envelope, rx, timeout).await
    }

    async fn request<T>(
        &self,
        envelope: Envelope<B>,
        reply: oneshot::Receiver<ActorResult<T>>,
        timeout: Duration,
    ) -> ActorResult<T> {
        let exchange = async {
            if self.shared.tx.send(envelope).await.is_err() {
                return Err(self.closed_error());
            }
            match reply.await {
                Ok(outcome) => outcome,
                Err(_) => Err(ActorError::closed()
                    .with_detail(format!("actor `{}` stopped before replying", self.key()))),
            }
        };
        match time::timeout(timeout, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ActorError::timeout().with_detail(format!(
                "no reply from actor `{}` within {timeout:?}",
                self.key()
            ))),
        }
    }

    fn closed_error(&self) -> ActorError {
        ActorError::closed().with_detail(format!("actor `{}` is not running", self.key()))
    }
}

fn unexpected_output() -> ActorError {
    ActorError::new(ErrorCode::RpcFailed).with_detail("exec produced an unexpected value type")
}

/// Read-only view of an actor's behavior.
pub struct BehaviorRef<B> {
    cell: Arc<Mutex<B>>,
}

impl<B> Clone for BehaviorRef<B> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<B> BehaviorRef<B> {
    /// Waits until the actor is between envelopes and borrows its behavior.
    ///
    /// Holding the guard blocks the actor; do not call into the same actor while holding it.
    pub async fn read(&self) -> BehaviorGuard<'_, B> {
        BehaviorGuard(self.cell.lock().await)
    }
}

/// Shared borrow of a behavior, returned by [`BehaviorRef::read`].
pub struct BehaviorGuard<'a, B>(MutexGuard<'a, B>);

impl<B> Deref for BehaviorGuard<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.0
    }
}

/// Object-safe view of an actor used by managers and the group registry.
pub(crate) trait ManagedActor: Send + Sync + 'static {
    fn key(&self) -> &Key;
    fn uid(&self) -> u64;
    fn status(&self) -> ActorStatus;
    fn is_alive(&self) -> bool;
    fn terminated_token(&self) -> &CancellationToken;
    fn send_stop(&self, reason: ActorError) -> BoxFuture<'_, ActorResult<()>>;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<B: Behavior> ManagedActor for ActorShared<B> {
    fn key(&self) -> &Key {
        &self.key
    }

    fn uid(&self) -> u64 {
        self.uid
    }

    fn status(&self) -> ActorStatus {
        self.status.get()
    }

    fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    fn terminated_token(&self) -> &CancellationToken {
        &self.terminated
    }

    fn send_stop(&self, reason: ActorError) -> BoxFuture<'_, ActorResult<()>> {
        Box::pin(async move {
            self.tx
                .send(Envelope::Stop(reason))
                .await
                .map_err(|_| ActorError::closed())
        })
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Type-erased actor handle, as stored in manager registries and groups.
#[derive(Clone)]
pub struct ActorRef {
    inner: Arc<dyn ManagedActor>,
}

impl ActorRef {
    /// The key the actor is registered under.
    pub fn key(&self) -> &Key {
        self.inner.key()
    }

    /// System-unique serial of the actor; keys are only unique per manager.
    pub(crate) fn uid(&self) -> u64 {
        self.inner.uid()
    }

    /// Current lifecycle status.
    pub fn status(&self) -> ActorStatus {
        self.inner.status()
    }

    /// True while the mailbox still accepts messages.
    pub fn is_alive(&self) -> bool {
        self.inner.is_alive()
    }

    /// Asks the actor to stop; see [`ActorHandle::stop`].
    pub async fn stop(&self, reason: ActorError) -> ActorResult<()> {
        self.inner.send_stop(reason).await
    }

    /// Resolves once the actor has terminated.
    pub async fn terminated(&self) {
        self.inner.terminated_token().cancelled().await;
    }

    /// Recovers the typed handle if the actor runs behavior `B`.
    pub fn downcast<B: Behavior>(&self) -> Option<ActorHandle<B>> {
        Arc::clone(&self.inner)
            .into_any()
            .downcast::<ActorShared<B>>()
            .ok()
            .map(ActorHandle::from_shared)
    }
}

impl PartialEq for ActorRef {
    fn eq(&self, other: &Self) -> bool {
        self.uid() == other.uid()
    }
}

impl Eq for ActorRef {}

impl std::hash::Hash for ActorRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.uid().hash(state);
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("key", self.key())
            .field("status", &self.status())
            .finish()
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl<B: Behavior> From<&ActorHandle<B>> for ActorRef {
    fn from(value: &ActorHandle<B>) -> Self {
        value.to_ref()
    }
}
