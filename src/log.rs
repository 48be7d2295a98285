//! Pluggable sink for error records produced by the runtime.
//!
//! Crashes caught at actor boundaries, failed `terminate` hooks and panics in
//! detached tasks are reported here. Lifecycle events (spawn, stop, manager
//! shutdown) go straight to `tracing` at debug/info level.

use std::fmt;

/// Receives formatted error records.
pub trait LogSink: Send + Sync + 'static {
    /// Records one error.
    fn log_error(&self, record: fmt::Arguments<'_>);
}

/// Default sink: forwards records to `tracing::error!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log_error(&self, record: fmt::Arguments<'_>) {
        tracing::error!(target: "tokio_actor_tree", "{record}");
    }
}
