use std::time::Duration;

use async_trait::async_trait;
use tokio_actor_tree::{
    ActorContext, ActorResult, Behavior, ErrorCode, ExecFn, ExecValue, System, INFINITY,
};

#[derive(Default)]
struct Ledger {
    entries: Vec<String>,
    total: i64,
}

enum LedgerMsg {
    Record(String),
    Entries,
}

#[async_trait]
impl Behavior for Ledger {
    type Message = LedgerMsg;
    type Reply = Vec<String>;

    async fn handle_msg(
        &mut self,
        msg: Self::Message,
        _ctx: &mut ActorContext<Self>,
    ) -> ActorResult<Self::Reply> {
        match msg {
            LedgerMsg::Record(entry) => {
                self.entries.push(entry);
                Ok(Vec::new())
            }
            LedgerMsg::Entries => Ok(self.entries.clone()),
        }
    }
}

fn add() -> ExecFn<Ledger> {
    ExecFn::new2("add", |ledger: &mut Ledger, label: String, amount: i64| {
        ledger.entries.push(label);
        ledger.total += amount;
        (ledger.total,)
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sync_exec_returns_ordered_results() {
    let system = System::new();
    let ledger = system.root().spawn("ledger", Ledger::default()).await.unwrap();

    let args: Vec<ExecValue> = vec![Box::new("deposit".to_string()), Box::new(40i64)];
    let results = ledger.sync_exec(&add(), INFINITY, args).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(*results[0].downcast_ref::<i64>().unwrap(), 40);

    let summary = ExecFn::new0("summary", |ledger: &mut Ledger| {
        (ledger.entries.len(), ledger.total)
    });
    let results = ledger
        .sync_exec(&summary, Duration::from_secs(1), Vec::new())
        .await
        .unwrap();
    assert_eq!(*results[0].downcast_ref::<usize>().unwrap(), 1);
    assert_eq!(*results[1].downcast_ref::<i64>().unwrap(), 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn arity_mismatch_leaves_the_mailbox_untouched() {
    let system = System::new();
    let ledger = system.root().spawn("ledger", Ledger::default()).await.unwrap();

    ledger.cast(LedgerMsg::Record("before".into())).await.unwrap();
    let args: Vec<ExecValue> = vec![Box::new("only label".to_string())];
    let err = ledger.sync_exec(&add(), INFINITY, args).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ParameterCountMismatch);
    assert_eq!(err.detail(), Some("add: expected : 2, actual : 1"));

    let err = ledger.async_exec(&add(), Vec::new()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ParameterCountMismatch);
    ledger.cast(LedgerMsg::Record("after".into())).await.unwrap();

    let entries = ledger.call_infinity(LedgerMsg::Entries).await.unwrap();
    assert_eq!(entries, vec!["before".to_string(), "after".to_string()]);
    assert!(ledger.is_alive());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn mistyped_argument_is_rejected() {
    let system = System::new();
    let ledger = system.root().spawn("ledger", Ledger::default()).await.unwrap();

    let args: Vec<ExecValue> = vec![Box::new("label".to_string()), Box::new("forty")];
    let err = ledger.sync_exec(&add(), INFINITY, args).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::RpcFailed);
    assert!(ledger.is_alive());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_exec_runs_in_mailbox_order() {
    let system = System::new();
    let ledger = system.root().spawn("ledger", Ledger::default()).await.unwrap();

    ledger.cast(LedgerMsg::Record("first".into())).await.unwrap();
    let args: Vec<ExecValue> = vec![Box::new("second".to_string()), Box::new(5i64)];
    ledger.async_exec(&add(), args).await.unwrap();
    ledger
        .exec_cast(|ledger: &mut Ledger| ledger.entries.push("third".into()))
        .await
        .unwrap();
    ledger.cast(LedgerMsg::Record("fourth".into())).await.unwrap();

    let entries = ledger.call_infinity(LedgerMsg::Entries).await.unwrap();
    assert_eq!(entries, vec!["first", "second", "third", "fourth"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn typed_exec_returns_closure_result() {
    let system = System::new();
    let ledger = system.root().spawn("ledger", Ledger::default()).await.unwrap();

    let total = ledger
        .exec(
            |ledger: &mut Ledger| {
                ledger.total += 12;
                ledger.total
            },
            INFINITY,
        )
        .await
        .unwrap();
    assert_eq!(total, 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn exec_panic_crashes_the_actor() {
    let system = System::new();
    let ledger = system.root().spawn("ledger", Ledger::default()).await.unwrap();

    let err = ledger
        .exec(|_: &mut Ledger| -> i64 { panic!("bad exec") }, INFINITY)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Crash);
    assert_eq!(err.panic_message(), Some("bad exec"));

    ledger.terminated().await;
    assert!(system.root().lookup("ledger").is_none());
}
