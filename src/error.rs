//! Error values surfaced by the actor tree runtime.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::panic;
use std::sync::{Arc, Once};

use thiserror::Error;

use crate::actor::handle::ActorRef;
use crate::manager::Manager;

thread_local! {
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Chains a panic hook that records the backtrace of the panicking thread.
///
/// Actor hooks are unwound on the thread that polled them, so
/// [`ActorError::from_panic`] finds the trace in the same thread-local.
pub(crate) fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            let _ = PANIC_TRACE.try_with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

/// Result type for actor operations.
pub type ActorResult<T> = Result<T, ActorError>;

/// Fixed set of outcome codes carried by every [`ActorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No failure.
    Ok,
    /// The requested actor or manager does not exist.
    NotFound,
    /// The owning manager was cancelled while the actor was running.
    CancelledByContext,
    /// A panic was caught at an actor boundary.
    Crash,
    /// The actor was asked to stop.
    NormalStop,
    /// The caller gave up waiting for a reply.
    Timeout,
    /// The mailbox is closed or the owner is shutting down.
    Closed,
    /// The key is already registered.
    AlreadyExists,
    /// A gateway the actor depends on is offline.
    GatewayOffline,
    /// Exec arguments do not match the target's declared arity.
    ParameterCountMismatch,
    /// `init` failed; the cause carries the reason.
    InitFailed,
    /// An inbound payload could not be decoded.
    DeserializeFailed,
    /// A remote or dynamic invocation failed.
    RpcFailed,
}

impl ErrorCode {
    /// Stable numeric value of the code (`0` for [`ErrorCode::Ok`], negative otherwise).
    pub fn as_i32(self) -> i32 {
        match self {
            ErrorCode::Ok => 0,
            ErrorCode::NotFound => -1,
            ErrorCode::CancelledByContext => -2,
            ErrorCode::Crash => -3,
            ErrorCode::NormalStop => -4,
            ErrorCode::Timeout => -5,
            ErrorCode::Closed => -6,
            ErrorCode::AlreadyExists => -7,
            ErrorCode::GatewayOffline => -8,
            ErrorCode::ParameterCountMismatch => -9,
            ErrorCode::InitFailed => -10,
            ErrorCode::DeserializeFailed => -11,
            ErrorCode::RpcFailed => -12,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ErrorCode::Ok => "ok",
            ErrorCode::NotFound => "not found",
            ErrorCode::CancelledByContext => "cancelled by context",
            ErrorCode::Crash => "crash",
            ErrorCode::NormalStop => "normal stop",
            ErrorCode::Timeout => "timeout",
            ErrorCode::Closed => "closed",
            ErrorCode::AlreadyExists => "already exists",
            ErrorCode::GatewayOffline => "gateway offline",
            ErrorCode::ParameterCountMismatch => "parameter count mismatch",
            ErrorCode::InitFailed => "init failed",
            ErrorCode::DeserializeFailed => "deserialize failed",
            ErrorCode::RpcFailed => "rpc failed",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_i32())
    }
}

/// Structured failure value: a code, optional detail, an optional captured
/// panic and an optional preceding cause.
///
/// `Display` renders this link only; [`ActorError::report`] renders the whole
/// chain, oldest cause first.
#[derive(Debug, Clone, Error)]
#[error("{code}{}{}", detail_suffix(.detail), panic_suffix(.panic))]
pub struct ActorError {
    code: ErrorCode,
    detail: Option<String>,
    panic: Option<String>,
    trace: Option<String>,
    #[source]
    cause: Option<Box<ActorError>>,
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|text| format!(" info: {text}"))
        .unwrap_or_default()
}

fn panic_suffix(panic: &Option<String>) -> String {
    panic
        .as_deref()
        .map(|text| format!(" panic: {text}"))
        .unwrap_or_default()
}

impl ActorError {
    /// Creates an error with the given code and nothing else attached.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            detail: None,
            panic: None,
            trace: None,
            cause: None,
        }
    }

    /// Reason used for a regular, requested stop.
    pub fn normal_stop() -> Self {
        Self::new(ErrorCode::NormalStop)
    }

    /// The caller's deadline expired.
    pub fn timeout() -> Self {
        Self::new(ErrorCode::Timeout)
    }

    /// The target mailbox or manager is closed.
    pub fn closed() -> Self {
        Self::new(ErrorCode::Closed)
    }

    /// The requested entity does not exist.
    pub fn not_found() -> Self {
        Self::new(ErrorCode::NotFound)
    }

    /// Converts a caught panic payload into a [`ErrorCode::Crash`] error.
    ///
    /// Carries the backtrace recorded where the panic was raised, if the
    /// system's panic hook saw it on this thread.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let trace = PANIC_TRACE
            .try_with(|slot| slot.borrow_mut().take())
            .ok()
            .flatten();
        Self {
            code: ErrorCode::Crash,
            detail: None,
            panic: Some(panic_message(payload.as_ref())),
            trace,
            cause: None,
        }
    }

    /// Attaches free-text detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Links a preceding cause.
    pub fn with_cause(mut self, cause: ActorError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// The outcome code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Free-text detail, if any.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Message of the captured panic, if this error came from one.
    pub fn panic_message(&self) -> Option<&str> {
        self.panic.as_deref()
    }

    /// Backtrace captured alongside a panic.
    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }

    /// The preceding cause, if any.
    pub fn cause(&self) -> Option<&ActorError> {
        self.cause.as_deref()
    }

    /// Iterates the chain starting at this error and walking towards the root cause.
    pub fn chain(&self) -> impl Iterator<Item = &ActorError> {
        std::iter::successors(Some(self), |err| err.cause())
    }

    /// Returns true when any link of the chain carries `code`.
    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.chain().any(|err| err.code == code)
    }

    /// Renders the full chain, one link per line, oldest cause first.
    pub fn report(&self) -> String {
        let mut links: Vec<String> = self.chain().map(ToString::to_string).collect();
        links.reverse();
        links.join("\n")
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl From<SpawnError> for ActorError {
    fn from(value: SpawnError) -> Self {
        match value {
            SpawnError::Failed(err) => err,
            other => ActorError::new(other.code()).with_detail(other.to_string()),
        }
    }
}

impl From<ManagerError> for ActorError {
    fn from(value: ManagerError) -> Self {
        ActorError::new(value.code()).with_detail(value.to_string())
    }
}

/// Failures encountered while sending without awaiting capacity.
#[derive(Debug, Error, Clone)]
pub enum TrySendError {
    /// The mailbox is full.
    #[error("mailbox full")]
    Full,
    /// The mailbox is closed (actor stopped).
    #[error("mailbox closed")]
    Closed,
}

/// Failures encountered when spawning an actor under a manager.
#[derive(Debug, Error, Clone)]
pub enum SpawnError {
    /// No Tokio runtime was found in the current context.
    #[error("tokio runtime handle not in scope")]
    MissingRuntime,
    /// An actor with the same key is already registered; it is returned unchanged.
    #[error("actor `{0}` already registered")]
    AlreadyExists(ActorRef),
    /// The actor could not be started (init failure or manager shutting down).
    #[error(transparent)]
    Failed(#[from] ActorError),
}

impl SpawnError {
    /// The outcome code matching this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            SpawnError::MissingRuntime => ErrorCode::Closed,
            SpawnError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            SpawnError::Failed(err) => err.code(),
        }
    }

    /// The pre-existing actor, for [`SpawnError::AlreadyExists`].
    pub fn existing(&self) -> Option<&ActorRef> {
        match self {
            SpawnError::AlreadyExists(actor) => Some(actor),
            _ => None,
        }
    }
}

/// Failures encountered when creating a child manager.
#[derive(Debug, Error, Clone)]
pub enum ManagerError {
    /// A child with the same name exists; it is returned unchanged.
    #[error("manager `{0}` already registered")]
    AlreadyExists(Manager),
    /// The parent manager is shutting down.
    #[error("manager `{0}` is stopping")]
    Stopped(Arc<str>),
}

impl ManagerError {
    /// The outcome code matching this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            ManagerError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            ManagerError::Stopped(_) => ErrorCode::Closed,
        }
    }

    /// The pre-existing manager, for [`ManagerError::AlreadyExists`].
    pub fn existing(&self) -> Option<&Manager> {
        match self {
            ManagerError::AlreadyExists(manager) => Some(manager),
            ManagerError::Stopped(_) => None,
        }
    }
}
