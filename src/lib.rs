#![warn(missing_docs)]
//! Tokio Actor Tree is a Tokio-native actor runtime organised as a tree of
//! managers, with bounded mailboxes, request/reply calls, crash isolation and
//! cooperative shutdown.
//!
//! # Overview
//! - Every actor runs its [`Behavior`] on its own Tokio task and handles one envelope at a time.
//! - Managers own actors and child managers; [`Manager::stop_all`] cancels a whole subtree and waits for it.
//! - Panics in behavior code are caught, logged through the [`LogSink`] and become the actor's termination reason.
//! - Actors can join named groups in the [`GroupRegistry`] for broadcast-style addressing.
//! - See `demos/ping_pong.rs` for a runnable end-to-end example.
//!
//! ```rust,no_run
//! use tokio_actor_tree::{ActorContext, ActorError, ActorResult, Behavior, System};
//! use async_trait::async_trait;
//!
//! #[derive(Default)]
//! struct Counter {
//!     value: i64,
//! }
//!
//! enum Msg {
//!     Inc(i64),
//!     Get,
//! }
//!
//! #[async_trait]
//! impl Behavior for Counter {
//!     type Message = Msg;
//!     type Reply = i64;
//!
//!     async fn handle_msg(
//!         &mut self,
//!         msg: Self::Message,
//!         _ctx: &mut ActorContext<Self>,
//!     ) -> ActorResult<Self::Reply> {
//!         if let Msg::Inc(delta) = msg {
//!             self.value += delta;
//!         }
//!         Ok(self.value)
//!     }
//! }
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let system = System::new();
//!     let counter = system.root().spawn("counter", Counter::default()).await?;
//!     counter.cast(Msg::Inc(1)).await?;
//!     let _value = counter.call_infinity(Msg::Get).await?;
//!     system.shutdown(ActorError::normal_stop()).await;
//!     Ok(())
//! }
//! ```

pub mod actor;
pub mod error;
pub mod group;
pub mod log;
pub mod manager;
pub mod system;
pub mod types;

pub use actor::{
    context::ActorContext,
    exec::{ExecFn, ExecValue, IntoExecValues},
    handle::{ActorHandle, ActorRef, BehaviorGuard, BehaviorRef},
    runtime::{ActorConfig, MailboxConfig},
    Behavior, IntoActorConfig,
};
pub use error::{ActorError, ActorResult, ErrorCode, ManagerError, SpawnError, TrySendError};
pub use group::GroupRegistry;
pub use log::{LogSink, TracingSink};
pub use manager::Manager;
pub use system::{System, SystemBuilder, ROOT_MANAGER};
pub use types::{ActorStatus, Key, INFINITY};
