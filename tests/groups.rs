use std::collections::HashSet;

use async_trait::async_trait;
use tokio_actor_tree::{ActorContext, ActorError, ActorResult, Behavior, ErrorCode, Key, System};

struct Listener {
    room: &'static str,
    heard: Vec<String>,
}

impl Listener {
    fn new(room: &'static str) -> Self {
        Self {
            room,
            heard: Vec::new(),
        }
    }
}

#[derive(Clone)]
enum ListenerMsg {
    Say(String),
    Heard,
}

#[async_trait]
impl Behavior for Listener {
    type Message = ListenerMsg;
    type Reply = Vec<String>;

    async fn init(&mut self, ctx: &mut ActorContext<Self>) -> ActorResult<()> {
        ctx.join_group(self.room)
    }

    async fn handle_msg(
        &mut self,
        msg: Self::Message,
        _ctx: &mut ActorContext<Self>,
    ) -> ActorResult<Self::Reply> {
        match msg {
            ListenerMsg::Say(text) => {
                self.heard.push(text);
                Ok(Vec::new())
            }
            ListenerMsg::Heard => Ok(self.heard.clone()),
        }
    }
}

struct Bystander;

#[async_trait]
impl Behavior for Bystander {
    type Message = ();
    type Reply = ();

    async fn handle_msg(&mut self, _msg: (), _ctx: &mut ActorContext<Self>) -> ActorResult<()> {
        Ok(())
    }
}

fn keys_in(system: &System, group: &str) -> HashSet<Key> {
    system
        .groups()
        .actors_in_group(group)
        .iter()
        .map(|actor| actor.key().clone())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn members_leave_groups_when_they_terminate() {
    let system = System::new();
    let a = system.root().spawn("a", Listener::new("lobby")).await.unwrap();
    let _b = system.root().spawn("b", Listener::new("lobby")).await.unwrap();

    assert_eq!(keys_in(&system, "lobby"), HashSet::from([Key::from("a"), Key::from("b")]));
    assert_eq!(system.groups().groups_of(&a.to_ref()), vec![Key::from("lobby")]);

    a.stop(ActorError::normal_stop()).await.unwrap();
    a.terminated().await;
    assert_eq!(keys_in(&system, "lobby"), HashSet::from([Key::from("b")]));
    assert!(system.groups().groups_of(&a.to_ref()).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn broadcast_reaches_matching_members_only() {
    let system = System::new();
    let a = system.root().spawn("a", Listener::new("lobby")).await.unwrap();
    let b = system.root().spawn("b", Listener::new("lobby")).await.unwrap();
    let elsewhere = system.root().spawn("c", Listener::new("kitchen")).await.unwrap();
    let bystander = system.root().spawn("d", Bystander).await.unwrap();
    bystander.join_group("lobby").unwrap();

    let delivered = system
        .groups()
        .broadcast::<Listener>("lobby", ListenerMsg::Say("hello".into()))
        .await;
    assert_eq!(delivered, 2);

    for member in [&a, &b] {
        let heard = member.call_infinity(ListenerMsg::Heard).await.unwrap();
        assert_eq!(heard, vec!["hello".to_string()]);
    }
    assert!(elsewhere.call_infinity(ListenerMsg::Heard).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn leave_group_and_join_after_termination() {
    let system = System::new();
    let a = system.root().spawn("a", Listener::new("lobby")).await.unwrap();

    a.leave_group("lobby");
    assert!(keys_in(&system, "lobby").is_empty());
    a.join_group("lobby").unwrap();
    a.join_group("lobby").unwrap();
    assert_eq!(system.groups().actors_in_group("lobby").len(), 1);

    a.stop(ActorError::normal_stop()).await.unwrap();
    a.terminated().await;
    let err = a.join_group("lobby").unwrap_err();
    assert_eq!(err.code(), ErrorCode::Closed);
    assert!(keys_in(&system, "lobby").is_empty());
}

#[tokio::test]
async fn unknown_group_is_empty() {
    let system = System::new();
    assert!(system.groups().actors_in_group("nobody").is_empty());
    assert_eq!(
        system
            .groups()
            .broadcast::<Listener>("nobody", ListenerMsg::Heard)
            .await,
        0
    );
}
