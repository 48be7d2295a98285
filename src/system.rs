//! Process-wide context: root manager, group registry, key counter and log sink.
//!
//! A [`System`] is built once at startup and passed to whatever needs it.
//! Tests build one per case, so fixtures never share state.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::actor::runtime::ActorConfig;
use crate::error::{install_panic_hook, ActorError};
use crate::group::GroupRegistry;
use crate::log::{LogSink, TracingSink};
use crate::manager::Manager;
use crate::types::IdGenerator;

/// Name of the root manager.
pub const ROOT_MANAGER: &str = "global";

/// State shared by every manager and actor of one system.
pub(crate) struct SystemShared {
    pub(crate) groups: GroupRegistry,
    pub(crate) keys: IdGenerator,
    pub(crate) serials: IdGenerator,
    pub(crate) sink: Arc<dyn LogSink>,
    pub(crate) actor_defaults: ActorConfig,
}

impl SystemShared {
    pub(crate) fn log_error(&self, record: fmt::Arguments<'_>) {
        self.sink.log_error(record);
    }
}

/// Handle to one actor system. Cloning is cheap.
///
/// ```rust,no_run
/// use tokio_actor_tree::{ActorError, System};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let system = System::builder().mailbox_capacity(128).build();
/// let players = system.root().create_child("players")?;
/// assert_eq!(players.name(), "players");
/// system.shutdown(ActorError::normal_stop()).await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct System {
    shared: Arc<SystemShared>,
    root: Manager,
}

impl System {
    /// Creates a system with the default configuration.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts configuring a system.
    pub fn builder() -> SystemBuilder {
        SystemBuilder::default()
    }

    /// The root of the manager tree.
    pub fn root(&self) -> &Manager {
        &self.root
    }

    /// The group registry shared by every actor of this system.
    pub fn groups(&self) -> &GroupRegistry {
        &self.shared.groups
    }

    /// Mailbox and other defaults applied when a spawn does not pass its own config.
    pub fn actor_defaults(&self) -> &ActorConfig {
        &self.shared.actor_defaults
    }

    /// Writes an error record to the configured sink.
    pub fn log_error(&self, record: fmt::Arguments<'_>) {
        self.shared.log_error(record);
    }

    /// Runs `work` on a detached task outside any manager.
    ///
    /// A panic inside `work` is caught and reported through the log sink; it
    /// never reaches the caller. Must be called from within a Tokio runtime.
    pub fn just_run<F>(&self, work: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            if let Err(payload) = AssertUnwindSafe(work).catch_unwind().await {
                let crash = ActorError::from_panic(payload);
                shared.log_error(format_args!(
                    "detached task crashed: {crash}\n{}",
                    crash.trace().unwrap_or_default()
                ));
            }
        })
    }

    /// Stops the whole tree; see [`Manager::stop_all`].
    pub async fn shutdown(&self, reason: ActorError) {
        self.root.stop_all(reason).await;
    }
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System").field("root", &self.root).finish()
    }
}

/// Builder for [`System`].
#[derive(Default)]
pub struct SystemBuilder {
    sink: Option<Arc<dyn LogSink>>,
    actor_defaults: ActorConfig,
}

impl SystemBuilder {
    /// Routes error records to `sink` instead of `tracing`.
    pub fn log_sink(mut self, sink: impl LogSink) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Same as [`SystemBuilder::log_sink`] for a sink that is already shared.
    pub fn shared_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Default mailbox capacity for actors spawned without their own config.
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.actor_defaults.mailbox.capacity = capacity;
        self
    }

    /// Default config for actors spawned without their own.
    pub fn actor_defaults(mut self, config: ActorConfig) -> Self {
        self.actor_defaults = config;
        self
    }

    /// Creates the system and its root manager.
    pub fn build(self) -> System {
        install_panic_hook();
        let shared = Arc::new(SystemShared {
            groups: GroupRegistry::default(),
            keys: IdGenerator::default(),
            serials: IdGenerator::default(),
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
            actor_defaults: self.actor_defaults,
        });
        let root = Manager::root(ROOT_MANAGER, Arc::clone(&shared));
        System { shared, root }
    }
}
