use std::future::Future;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use crate::actor::handle::{ActorHandle, ActorShared};
use crate::actor::{context::ActorContext, Behavior, Envelope};
use crate::error::{ActorError, ActorResult, ErrorCode, SpawnError};
use crate::manager::Manager;
use crate::types::{ActorStatus, Key, StatusCell};

/// Configuration for the actor's mailbox.
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    /// The maximum number of envelopes the mailbox can hold.
    pub capacity: usize,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

impl MailboxConfig {
    /// Sets the mailbox capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

/// Configuration for spawning an actor.
#[derive(Debug, Clone, Default)]
pub struct ActorConfig {
    /// Mailbox configuration.
    pub mailbox: MailboxConfig,
}

impl ActorConfig {
    /// Sets the mailbox capacity.
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox.capacity = capacity;
        self
    }

    /// Sets the complete mailbox configuration.
    pub fn with_mailbox(mut self, mailbox: MailboxConfig) -> Self {
        self.mailbox = mailbox;
        self
    }
}

/// Registers a new actor under `manager`, starts its task and waits for `init`.
pub(crate) async fn spawn_actor<B: Behavior>(
    manager: &Manager,
    key: Option<Key>,
    behavior: B,
    config: ActorConfig,
) -> Result<ActorHandle<B>, SpawnError> {
    let runtime = Handle::try_current().map_err(|_| SpawnError::MissingRuntime)?;
    let system = Arc::clone(manager.system());
    let key = key.unwrap_or_else(|| system.keys.next_key());
    let mailbox_capacity = config.mailbox.capacity.max(1);
    let (tx, rx) = mpsc::channel(mailbox_capacity);
    let handle = ActorHandle::from_shared(Arc::new(ActorShared {
        key,
        uid: system.serials.next(),
        tx,
        mailbox_capacity,
        behavior: Arc::new(Mutex::new(behavior)),
        status: StatusCell::new(),
        terminated: CancellationToken::new(),
        system,
        manager: manager.downgrade(),
    }));

    // Held until the task is tracked, so a concurrent stop_all waits for it.
    let slot = manager.register(handle.to_ref())?;

    let (init_tx, init_rx) = oneshot::channel();
    let context = ActorContext::new(handle.clone(), manager.clone());
    manager
        .tracker()
        .spawn_on(run_actor(context, rx, init_tx), &runtime);
    drop(slot);

    match init_rx.await {
        Ok(Ok(())) => {
            tracing::debug!(
                actor_key = %handle.key(),
                manager = %manager.name(),
                "actor spawned"
            );
            Ok(handle)
        }
        Ok(Err(reason)) => Err(SpawnError::Failed(reason)),
        Err(_) => Err(SpawnError::Failed(
            ActorError::new(ErrorCode::InitFailed)
                .with_detail("actor task ended before reporting init"),
        )),
    }
}

async fn run_actor<B: Behavior>(
    mut ctx: ActorContext<B>,
    mut mailbox: mpsc::Receiver<Envelope<B>>,
    init_tx: oneshot::Sender<ActorResult<()>>,
) {
    let cell = Arc::clone(&ctx.self_handle().shared().behavior);

    ctx.set_status(ActorStatus::Initializing);
    let init = {
        let mut behavior = cell.lock().await;
        guarded(behavior.init(&mut ctx)).await
    };
    let init = match init {
        Ok(outcome) => outcome,
        Err(crash) => {
            report_crash(&ctx, "init", &crash);
            Err(crash)
        }
    };
    if let Err(cause) = init {
        let reason = ActorError::new(ErrorCode::InitFailed).with_cause(cause);
        finalize(&cell, &mut ctx, &mut mailbox, &reason).await;
        let _ = init_tx.send(Err(reason));
        return;
    }

    ctx.set_status(ActorStatus::Running);
    let _ = init_tx.send(Ok(()));

    let cancel = ctx.manager().token().clone();
    let reason = loop {
        let envelope = tokio::select! {
            biased;
            _ = cancel.cancelled() => break ActorError::new(ErrorCode::CancelledByContext),
            next = mailbox.recv() => match next {
                Some(envelope) => envelope,
                None => break ActorError::closed(),
            },
        };
        let mut behavior = cell.lock().await;
        if let ControlFlow::Break(reason) = dispatch(&mut *behavior, &mut ctx, envelope).await {
            break reason;
        }
    };

    finalize(&cell, &mut ctx, &mut mailbox, &reason).await;
}

async fn dispatch<B: Behavior>(
    behavior: &mut B,
    ctx: &mut ActorContext<B>,
    envelope: Envelope<B>,
) -> ControlFlow<ActorError> {
    match envelope {
        Envelope::Message { payload, responder } => {
            let outcome = match guarded(behavior.handle_msg(payload, ctx)).await {
                Ok(outcome) => outcome,
                Err(crash) => {
                    report_crash(ctx, "handling a message", &crash);
                    Err(crash)
                }
            };
            settle(outcome, responder)
        }
        Envelope::Exec { task, responder } => {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| task(behavior))) {
                Ok(outcome) => outcome,
                Err(payload) => {
                    let crash = ActorError::from_panic(payload);
                    report_crash(ctx, "running an exec", &crash);
                    Err(crash)
                }
            };
            settle(outcome, responder)
        }
        Envelope::Stop(reason) => ControlFlow::Break(reason),
    }
}

/// Replies to a waiting caller, if any, and decides whether the loop goes on.
fn settle<T>(
    outcome: ActorResult<T>,
    responder: Option<oneshot::Sender<ActorResult<T>>>,
) -> ControlFlow<ActorError> {
    let flow = match &outcome {
        Err(err) if err.code() != ErrorCode::Ok => ControlFlow::Break(err.clone()),
        _ => ControlFlow::Continue(()),
    };
    if let Some(tx) = responder {
        // The caller may have timed out and dropped its receiver.
        let _ = tx.send(outcome);
    }
    flow
}

/// Termination sequence; runs exactly once per actor.
async fn finalize<B: Behavior>(
    cell: &Mutex<B>,
    ctx: &mut ActorContext<B>,
    mailbox: &mut mpsc::Receiver<Envelope<B>>,
    reason: &ActorError,
) {
    mailbox.close();
    ctx.set_status(ActorStatus::Terminating);

    {
        let mut behavior = cell.lock().await;
        if let Err(payload) = AssertUnwindSafe(behavior.terminate(reason, ctx))
            .catch_unwind()
            .await
        {
            report_crash(ctx, "terminating", &ActorError::from_panic(payload));
        }
    }

    let actor = ctx.self_handle().to_ref();
    ctx.groups().purge(&actor);
    ctx.manager().deregister(&actor);
    ctx.set_status(ActorStatus::Terminated);

    tracing::debug!(
        actor_key = %ctx.key(),
        manager = %ctx.manager().name(),
        reason = %reason,
        "actor terminated"
    );
    ctx.self_handle().shared().terminated.cancel();
}

/// Runs a behavior hook, turning a panic into a [`ErrorCode::Crash`] error.
async fn guarded<T, F>(hook: F) -> Result<ActorResult<T>, ActorError>
where
    F: Future<Output = ActorResult<T>>,
{
    AssertUnwindSafe(hook)
        .catch_unwind()
        .await
        .map_err(ActorError::from_panic)
}

fn report_crash<B: Behavior>(ctx: &ActorContext<B>, stage: &str, crash: &ActorError) {
    ctx.log_error(format_args!(
        "actor `{}` in manager `{}` crashed while {stage}: {crash}\n{}",
        ctx.key(),
        ctx.manager().name(),
        crash.trace().unwrap_or_default()
    ));
}
