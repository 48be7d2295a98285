//! Dynamic invocation of functions on an actor's own task.
//!
//! Two forms exist. Typed closures ([`ActorHandle::exec`]) are bound at the
//! call site, so arity and type errors are compile errors. [`ExecFn`] declares
//! a parameter list and accepts a runtime argument vector; the argument count
//! and types are validated before anything touches the mailbox, failing with
//! [`ErrorCode::ParameterCountMismatch`] or [`ErrorCode::RpcFailed`].
//!
//! [`ActorHandle::exec`]: crate::ActorHandle::exec

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::actor::{Behavior, ExecOutput, ExecTask};
use crate::error::{ActorError, ActorResult, ErrorCode};

/// One argument or return value of a dynamic exec.
pub type ExecValue = Box<dyn Any + Send>;

type ExecBody<B> = dyn Fn(&mut B, Vec<ExecValue>) -> ActorResult<Vec<ExecValue>> + Send + Sync;

#[derive(Clone, Copy)]
struct Param {
    type_id: TypeId,
    type_name: &'static str,
}

impl Param {
    fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }
}

/// A function with a declared parameter list, invocable on an actor through
/// [`ActorHandle::sync_exec`](crate::ActorHandle::sync_exec) and
/// [`ActorHandle::async_exec`](crate::ActorHandle::async_exec).
///
/// ```
/// use tokio_actor_tree::ExecFn;
/// # struct Room { topic: String }
/// # #[async_trait::async_trait]
/// # impl tokio_actor_tree::Behavior for Room {
/// #     type Message = ();
/// #     type Reply = ();
/// #     async fn handle_msg(&mut self, _: (), _: &mut tokio_actor_tree::ActorContext<Self>) -> tokio_actor_tree::ActorResult<()> { Ok(()) }
/// # }
/// let set_topic = ExecFn::<Room>::new1("set_topic", |room: &mut Room, topic: String| {
///     let previous = std::mem::replace(&mut room.topic, topic);
///     (previous,)
/// });
/// assert_eq!(set_topic.arity(), 1);
/// ```
pub struct ExecFn<B> {
    name: &'static str,
    params: Vec<Param>,
    body: Arc<ExecBody<B>>,
}

impl<B> Clone for ExecFn<B> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            params: self.params.clone(),
            body: Arc::clone(&self.body),
        }
    }
}

impl<B> fmt::Debug for ExecFn<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&str> = self.params.iter().map(|param| param.type_name).collect();
        f.debug_struct("ExecFn")
            .field("name", &self.name)
            .field("params", &params)
            .finish()
    }
}

impl<B: Behavior> ExecFn<B> {
    /// A function taking no arguments.
    pub fn new0<F, R>(name: &'static str, f: F) -> Self
    where
        F: Fn(&mut B) -> R + Send + Sync + 'static,
        R: IntoExecValues,
    {
        Self {
            name,
            params: Vec::new(),
            body: Arc::new(move |behavior: &mut B, _args: Vec<ExecValue>| {
                Ok(f(behavior).into_exec_values())
            }),
        }
    }

    /// A function taking one argument.
    pub fn new1<A, F, R>(name: &'static str, f: F) -> Self
    where
        A: Any + Send,
        F: Fn(&mut B, A) -> R + Send + Sync + 'static,
        R: IntoExecValues,
    {
        Self {
            name,
            params: vec![Param::of::<A>()],
            body: Arc::new(move |behavior: &mut B, args: Vec<ExecValue>| {
                let mut args = args.into_iter();
                let a = take_arg::<A>(&mut args, name, 0)?;
                Ok(f(behavior, a).into_exec_values())
            }),
        }
    }

    /// A function taking two arguments.
    pub fn new2<A1, A2, F, R>(name: &'static str, f: F) -> Self
    where
        A1: Any + Send,
        A2: Any + Send,
        F: Fn(&mut B, A1, A2) -> R + Send + Sync + 'static,
        R: IntoExecValues,
    {
        Self {
            name,
            params: vec![Param::of::<A1>(), Param::of::<A2>()],
            body: Arc::new(move |behavior: &mut B, args: Vec<ExecValue>| {
                let mut args = args.into_iter();
                let a1 = take_arg::<A1>(&mut args, name, 0)?;
                let a2 = take_arg::<A2>(&mut args, name, 1)?;
                Ok(f(behavior, a1, a2).into_exec_values())
            }),
        }
    }

    /// A function taking three arguments.
    pub fn new3<A1, A2, A3, F, R>(name: &'static str, f: F) -> Self
    where
        A1: Any + Send,
        A2: Any + Send,
        A3: Any + Send,
        F: Fn(&mut B, A1, A2, A3) -> R + Send + Sync + 'static,
        R: IntoExecValues,
    {
        Self {
            name,
            params: vec![Param::of::<A1>(), Param::of::<A2>(), Param::of::<A3>()],
            body: Arc::new(move |behavior: &mut B, args: Vec<ExecValue>| {
                let mut args = args.into_iter();
                let a1 = take_arg::<A1>(&mut args, name, 0)?;
                let a2 = take_arg::<A2>(&mut args, name, 1)?;
                let a3 = take_arg::<A3>(&mut args, name, 2)?;
                Ok(f(behavior, a1, a2, a3).into_exec_values())
            }),
        }
    }

    /// The declared name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The declared number of parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Checks the arguments against the declared parameters and binds them
    /// into a task ready for the mailbox.
    pub(crate) fn bind(&self, args: Vec<ExecValue>) -> ActorResult<ExecTask<B>> {
        if args.len() != self.params.len() {
            return Err(ActorError::new(ErrorCode::ParameterCountMismatch).with_detail(format!(
                "{}: expected : {}, actual : {}",
                self.name,
                self.params.len(),
                args.len()
            )));
        }
        for (index, (param, arg)) in self.params.iter().zip(&args).enumerate() {
            if (**arg).type_id() != param.type_id {
                return Err(ActorError::new(ErrorCode::RpcFailed).with_detail(format!(
                    "{}: argument {index} expects {}",
                    self.name, param.type_name
                )));
            }
        }
        let body = Arc::clone(&self.body);
        Ok(Box::new(move |behavior: &mut B| {
            body(behavior, args).map(|values| Box::new(values) as ExecOutput)
        }))
    }
}

fn take_arg<T: Any>(
    args: &mut std::vec::IntoIter<ExecValue>,
    name: &'static str,
    index: usize,
) -> ActorResult<T> {
    args.next()
        .and_then(|value| value.downcast::<T>().ok())
        .map(|value| *value)
        .ok_or_else(|| {
            ActorError::new(ErrorCode::RpcFailed)
                .with_detail(format!("{name}: argument {index} is missing or mistyped"))
        })
}

/// Conversion of a function's return value into an ordered list of values.
///
/// Implemented for `()` and tuples of up to four elements.
pub trait IntoExecValues {
    /// Flattens `self` into exec values, preserving order.
    fn into_exec_values(self) -> Vec<ExecValue>;
}

impl IntoExecValues for () {
    fn into_exec_values(self) -> Vec<ExecValue> {
        Vec::new()
    }
}

impl IntoExecValues for Vec<ExecValue> {
    fn into_exec_values(self) -> Vec<ExecValue> {
        self
    }
}

macro_rules! impl_into_exec_values {
    ($($name:ident),+) => {
        impl<$($name: Any + Send),+> IntoExecValues for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_exec_values(self) -> Vec<ExecValue> {
                let ($($name,)+) = self;
                vec![$(Box::new($name) as ExecValue),+]
            }
        }
    };
}

impl_into_exec_values!(T1);
impl_into_exec_values!(T1, T2);
impl_into_exec_values!(T1, T2, T3);
impl_into_exec_values!(T1, T2, T3, T4);
