use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_actor_tree::{
    ActorContext, ActorError, ActorResult, ActorStatus, Behavior, ErrorCode, LogSink, System,
};

struct LifecycleActor {
    started: Arc<AtomicBool>,
    stopped: Arc<Mutex<Option<ErrorCode>>>,
}

impl LifecycleActor {
    fn new() -> (Self, Arc<AtomicBool>, Arc<Mutex<Option<ErrorCode>>>) {
        let started = Arc::new(AtomicBool::new(false));
        let stopped = Arc::new(Mutex::new(None));
        (
            Self {
                started: started.clone(),
                stopped: stopped.clone(),
            },
            started,
            stopped,
        )
    }
}

enum LifecycleMsg {
    Ping,
}

#[async_trait]
impl Behavior for LifecycleActor {
    type Message = LifecycleMsg;
    type Reply = &'static str;

    async fn init(&mut self, ctx: &mut ActorContext<Self>) -> ActorResult<()> {
        assert_eq!(ctx.status(), ActorStatus::Initializing);
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn handle_msg(
        &mut self,
        msg: Self::Message,
        _ctx: &mut ActorContext<Self>,
    ) -> ActorResult<Self::Reply> {
        match msg {
            LifecycleMsg::Ping => Ok("pong"),
        }
    }

    async fn terminate(&mut self, reason: &ActorError, ctx: &mut ActorContext<Self>) {
        assert_eq!(ctx.status(), ActorStatus::Terminating);
        *self.stopped.lock() = Some(reason.code());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lifecycle_hooks_fire_in_order() {
    let system = System::new();
    let (actor, started_flag, stopped) = LifecycleActor::new();
    let handle = system.root().spawn("lifecycle", actor).await.unwrap();

    // Spawn resolves only after init has run.
    assert!(started_flag.load(Ordering::SeqCst));
    assert_eq!(handle.call_infinity(LifecycleMsg::Ping).await.unwrap(), "pong");

    handle.stop(ActorError::normal_stop()).await.unwrap();
    handle.terminated().await;

    assert_eq!(*stopped.lock(), Some(ErrorCode::NormalStop));
    assert!(system.root().lookup("lifecycle").is_none());
    assert_eq!(system.root().active_actors(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_key_returns_the_original_actor() {
    let system = System::new();
    let (first, _, _) = LifecycleActor::new();
    let (second, second_started, _) = LifecycleActor::new();

    let original = system.root().spawn("k", first).await.unwrap();
    let err = system.root().spawn("k", second).await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::AlreadyExists);
    let existing = err.existing().unwrap().downcast::<LifecycleActor>().unwrap();
    assert_eq!(existing, original);
    assert!(!second_started.load(Ordering::SeqCst), "the rejected behavior must never start");
    assert_eq!(system.root().active_actors(), 1);
}

struct FailingInit {
    panic: bool,
    terminated_with: Arc<Mutex<Option<ErrorCode>>>,
}

#[async_trait]
impl Behavior for FailingInit {
    type Message = ();
    type Reply = ();

    async fn init(&mut self, _ctx: &mut ActorContext<Self>) -> ActorResult<()> {
        if self.panic {
            panic!("init exploded");
        }
        Err(ActorError::not_found().with_detail("config missing"))
    }

    async fn handle_msg(&mut self, _msg: (), _ctx: &mut ActorContext<Self>) -> ActorResult<()> {
        Ok(())
    }

    async fn terminate(&mut self, reason: &ActorError, _ctx: &mut ActorContext<Self>) {
        *self.terminated_with.lock() = Some(reason.code());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn init_error_fails_spawn_and_leaves_nothing_registered() {
    let system = System::new();
    let terminated_with = Arc::new(Mutex::new(None));
    let err = system
        .root()
        .spawn(
            "broken",
            FailingInit {
                panic: false,
                terminated_with: terminated_with.clone(),
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::InitFailed);
    let reason = ActorError::from(err);
    assert_eq!(reason.cause().map(ActorError::code), Some(ErrorCode::NotFound));
    assert_eq!(*terminated_with.lock(), Some(ErrorCode::InitFailed));
    assert!(system.root().lookup("broken").is_none());
    assert_eq!(system.root().active_actors(), 0);
}

#[derive(Clone, Default)]
struct RecordingSink {
    records: Arc<Mutex<Vec<String>>>,
}

impl LogSink for RecordingSink {
    fn log_error(&self, record: std::fmt::Arguments<'_>) {
        self.records.lock().push(record.to_string());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn init_panic_is_reported_as_init_failed_crash() {
    let sink = RecordingSink::default();
    let system = System::builder().log_sink(sink.clone()).build();
    let err = system
        .root()
        .spawn(
            "panicky",
            FailingInit {
                panic: true,
                terminated_with: Arc::new(Mutex::new(None)),
            },
        )
        .await
        .unwrap_err();

    let reason = ActorError::from(err);
    assert_eq!(reason.code(), ErrorCode::InitFailed);
    let cause = reason.cause().unwrap();
    assert_eq!(cause.code(), ErrorCode::Crash);
    assert_eq!(cause.panic_message(), Some("init exploded"));
    assert!(system.root().lookup("panicky").is_none());

    let records = sink.records.lock();
    assert_eq!(records.len(), 1);
    assert!(records[0].contains("crashed while init"));
}

struct PanickyTerminate {
    terminations: Arc<AtomicUsize>,
}

#[async_trait]
impl Behavior for PanickyTerminate {
    type Message = ();
    type Reply = ();

    async fn handle_msg(&mut self, _msg: (), _ctx: &mut ActorContext<Self>) -> ActorResult<()> {
        Ok(())
    }

    async fn terminate(&mut self, _reason: &ActorError, _ctx: &mut ActorContext<Self>) {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        panic!("terminate exploded");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn terminate_panic_is_contained_and_logged() {
    let sink = RecordingSink::default();
    let system = System::builder().log_sink(sink.clone()).build();
    let terminations = Arc::new(AtomicUsize::new(0));
    let handle = system
        .root()
        .spawn(
            "fragile",
            PanickyTerminate {
                terminations: terminations.clone(),
            },
        )
        .await
        .unwrap();

    handle.stop(ActorError::normal_stop()).await.unwrap();
    handle.terminated().await;

    assert_eq!(terminations.load(Ordering::SeqCst), 1);
    assert_eq!(handle.status(), ActorStatus::Terminated);
    assert!(system.root().lookup("fragile").is_none());
    let records = sink.records.lock();
    assert!(records.iter().any(|record| record.contains("crashed while terminating")));
}

struct SelfStopping;

#[async_trait]
impl Behavior for SelfStopping {
    type Message = ();
    type Reply = ();

    async fn handle_msg(&mut self, _msg: (), ctx: &mut ActorContext<Self>) -> ActorResult<()> {
        ctx.self_handle()
            .stop(ActorError::normal_stop().with_detail("done"))
            .await
    }
}

#[tokio::test]
async fn actor_can_stop_itself() {
    let system = System::new();
    let handle = system.root().spawn("self-stop", SelfStopping).await.unwrap();

    handle.call_infinity(()).await.unwrap();
    handle.terminated().await;
    assert!(!handle.is_alive());
    assert_eq!(system.root().active_actors(), 0);
}
