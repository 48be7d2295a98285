//! Behavior contract and the envelopes an actor's mailbox carries.

/// Actor execution context.
pub mod context;
/// Dynamic invocation of functions on an actor's task.
pub mod exec;
/// Handles for external communication.
pub mod handle;
/// Runtime configuration, spawning and the mailbox loop.
pub mod runtime;

use std::any::Any;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::{ActorError, ActorResult};
use context::ActorContext;
use runtime::ActorConfig;

/// User-supplied state machine driven by an actor.
///
/// The runtime calls `init` once, then `handle_msg` for every message in
/// mailbox order, then `terminate` exactly once with the reason the actor
/// stopped. All three run on the actor's own task, one at a time.
#[async_trait]
pub trait Behavior: Sized + Send + 'static {
    /// The type of message this behavior receives.
    type Message: Send + 'static;

    /// The type of reply produced for each message.
    ///
    /// Use `()` if the behavior does not reply with data.
    type Reply: Send + 'static;

    /// Called before any message is processed.
    ///
    /// The spawner waits for this hook; returning an error aborts the spawn with
    /// [`ErrorCode::InitFailed`](crate::ErrorCode::InitFailed).
    async fn init(&mut self, _ctx: &mut ActorContext<Self>) -> ActorResult<()> {
        Ok(())
    }

    /// Handles one message.
    ///
    /// Returning an error whose code is not [`ErrorCode::Ok`](crate::ErrorCode::Ok)
    /// ends the actor with that error as the termination reason.
    async fn handle_msg(
        &mut self,
        msg: Self::Message,
        ctx: &mut ActorContext<Self>,
    ) -> ActorResult<Self::Reply>;

    /// Called once when the actor stops, whatever the cause.
    async fn terminate(&mut self, _reason: &ActorError, _ctx: &mut ActorContext<Self>) {}
}

/// Boxed value produced by an exec task.
pub(crate) type ExecOutput = Box<dyn Any + Send>;

/// Already-bound task executed against the behavior on the actor's task.
pub(crate) type ExecTask<B> = Box<dyn FnOnce(&mut B) -> ActorResult<ExecOutput> + Send>;

/// Internal representation of everything sent to an actor.
pub(crate) enum Envelope<B: Behavior> {
    /// A message for `handle_msg`; calls carry a responder.
    Message {
        payload: B::Message,
        responder: Option<oneshot::Sender<ActorResult<B::Reply>>>,
    },
    /// A task run against the behavior; sync execs carry a responder.
    Exec {
        task: ExecTask<B>,
        responder: Option<oneshot::Sender<ActorResult<ExecOutput>>>,
    },
    /// Ends the loop with the given reason.
    Stop(ActorError),
}

/// Helper trait for flexible ActorConfig parameter.
///
/// This allows passing `()`, `None`, `Some(config)`, `config` or `&config` to
/// [`Manager::spawn_with`](crate::Manager::spawn_with). `()` and `None` pick the
/// system-wide defaults.
pub trait IntoActorConfig {
    /// Converts the value into an `ActorConfig`, falling back to `defaults`.
    fn into_config(self, defaults: &ActorConfig) -> ActorConfig;
}

impl IntoActorConfig for ActorConfig {
    fn into_config(self, _defaults: &ActorConfig) -> ActorConfig {
        self
    }
}

impl IntoActorConfig for &ActorConfig {
    fn into_config(self, _defaults: &ActorConfig) -> ActorConfig {
        self.clone()
    }
}

impl IntoActorConfig for Option<ActorConfig> {
    fn into_config(self, defaults: &ActorConfig) -> ActorConfig {
        self.unwrap_or_else(|| defaults.clone())
    }
}

impl IntoActorConfig for () {
    fn into_config(self, defaults: &ActorConfig) -> ActorConfig {
        defaults.clone()
    }
}
