use async_trait::async_trait;
use tokio_actor_tree::{ActorConfig, ActorContext, ActorResult, Behavior, MailboxConfig, System};

#[derive(Default)]
struct DummyActor;

#[allow(dead_code)]
enum Msg {
    Noop,
}

#[async_trait]
impl Behavior for DummyActor {
    type Message = Msg;
    type Reply = ();

    async fn handle_msg(
        &mut self,
        _msg: Self::Message,
        _ctx: &mut ActorContext<Self>,
    ) -> ActorResult<Self::Reply> {
        Ok(())
    }
}

#[tokio::test]
async fn builder_pattern_for_mailbox_capacity() {
    let config = ActorConfig::default().with_mailbox_capacity(256);
    assert_eq!(config.mailbox.capacity, 256);

    let system = System::new();
    let actor = system
        .root()
        .spawn_with(Some("test".into()), DummyActor, config)
        .await
        .unwrap();
    assert_eq!(actor.mailbox_capacity(), 256);
}

#[tokio::test]
async fn config_can_be_passed_as_unit() {
    let system = System::new();
    let actor = system
        .root()
        .spawn_with(Some("test".into()), DummyActor, ())
        .await
        .unwrap();
    assert!(actor.is_alive());
    assert_eq!(actor.mailbox_capacity(), 64); // Default capacity
}

#[tokio::test]
async fn config_can_be_passed_as_none() {
    let system = System::builder().mailbox_capacity(8).build();
    let actor = system
        .root()
        .spawn_with(None, DummyActor, None)
        .await
        .unwrap();
    assert!(actor.is_alive());
    assert_eq!(actor.mailbox_capacity(), 8);
}

#[tokio::test]
async fn config_can_be_passed_as_some() {
    let config = ActorConfig::default().with_mailbox(MailboxConfig::default().with_capacity(16));
    let system = System::new();
    let actor = system
        .root()
        .spawn_with(Some("test".into()), DummyActor, Some(config))
        .await
        .unwrap();
    assert_eq!(actor.mailbox_capacity(), 16);
}

#[tokio::test]
async fn config_can_be_passed_as_reference() {
    let config = ActorConfig::default().with_mailbox_capacity(128);
    let system = System::new();
    let actor = system
        .root()
        .spawn_with(Some("test".into()), DummyActor, &config)
        .await
        .unwrap();
    assert_eq!(actor.mailbox_capacity(), 128);
}

#[tokio::test]
async fn system_defaults_apply_to_plain_spawn() {
    let system = System::builder()
        .actor_defaults(ActorConfig::default().with_mailbox_capacity(32))
        .build();
    assert_eq!(system.actor_defaults().mailbox.capacity, 32);

    let actor = system.root().spawn("test", DummyActor).await.unwrap();
    assert_eq!(actor.mailbox_capacity(), 32);
}

#[tokio::test]
async fn zero_capacity_is_raised_to_one() {
    let system = System::new();
    let actor = system
        .root()
        .spawn_with(
            Some("test".into()),
            DummyActor,
            ActorConfig::default().with_mailbox_capacity(0),
        )
        .await
        .unwrap();
    assert_eq!(actor.mailbox_capacity(), 1);
}
