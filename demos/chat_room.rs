//! A chat room without the network: one room actor per topic, one session
//! actor per user, and the group registry fanning lines out to members.

use std::time::Duration;

use async_trait::async_trait;
use tokio_actor_tree::{
    ActorContext, ActorError, ActorResult, Behavior, ErrorCode, ExecFn, ExecValue, Manager,
    System, INFINITY,
};

struct Session {
    nick: String,
    room: String,
    inbox: Vec<String>,
}

#[derive(Clone)]
enum SessionMsg {
    Deliver(String),
    Say(String),
    Inbox,
}

#[async_trait]
impl Behavior for Session {
    type Message = SessionMsg;
    type Reply = Vec<String>;

    async fn init(&mut self, ctx: &mut ActorContext<Self>) -> ActorResult<()> {
        ctx.join_group(self.room.as_str())
    }

    async fn handle_msg(
        &mut self,
        msg: Self::Message,
        ctx: &mut ActorContext<Self>,
    ) -> ActorResult<Self::Reply> {
        match msg {
            SessionMsg::Deliver(line) => {
                self.inbox.push(line);
                Ok(Vec::new())
            }
            SessionMsg::Say(text) => {
                let line = format!("<{}> {text}", self.nick);
                let room = ctx.manager().lookup_as::<Room>(self.room.as_str())?;
                room.cast(RoomMsg::Publish(line)).await?;
                Ok(Vec::new())
            }
            SessionMsg::Inbox => Ok(self.inbox.clone()),
        }
    }

    async fn terminate(&mut self, reason: &ActorError, _ctx: &mut ActorContext<Self>) {
        if reason.code() != ErrorCode::CancelledByContext {
            println!("{} left: {reason}", self.nick);
        }
    }
}

#[derive(Default)]
struct Room {
    topic: String,
    published: u64,
}

enum RoomMsg {
    Publish(String),
}

#[async_trait]
impl Behavior for Room {
    type Message = RoomMsg;
    type Reply = ();

    async fn handle_msg(
        &mut self,
        msg: Self::Message,
        ctx: &mut ActorContext<Self>,
    ) -> ActorResult<Self::Reply> {
        match msg {
            RoomMsg::Publish(line) => {
                self.published += 1;
                let group = ctx.key().clone();
                ctx.groups()
                    .broadcast::<Session>(group, SessionMsg::Deliver(line))
                    .await;
                Ok(())
            }
        }
    }
}

async fn join(chat: &Manager, nick: &str, room: &str) -> ActorResult<()> {
    let session = Session {
        nick: nick.to_string(),
        room: room.to_string(),
        inbox: Vec::new(),
    };
    chat.spawn(nick, session).await?;
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let system = System::builder().mailbox_capacity(128).build();
    let chat = system.root().create_child("chat")?;

    let lobby = chat.spawn("lobby", Room::default()).await?;
    for nick in ["ada", "brian", "carol"] {
        join(&chat, nick, "lobby").await?;
    }

    let set_topic = ExecFn::<Room>::new1("set_topic", |room: &mut Room, topic: String| {
        let previous = std::mem::replace(&mut room.topic, topic);
        (previous,)
    });
    let args: Vec<ExecValue> = vec![Box::new("rust async".to_string())];
    lobby.sync_exec(&set_topic, Duration::from_secs(1), args).await?;

    let ada = chat.lookup_as::<Session>("ada")?;
    ada.call_infinity(SessionMsg::Say("hello everyone".into())).await?;
    let brian = chat.lookup_as::<Session>("brian")?;
    brian.call_infinity(SessionMsg::Say("hi ada".into())).await?;

    // Make sure both publishes went out before reading inboxes.
    let published = lobby.exec(|room: &mut Room| room.published, INFINITY).await?;
    println!("lobby published {published} lines");

    let carol = chat.lookup_as::<Session>("carol")?;
    for line in carol.call_infinity(SessionMsg::Inbox).await? {
        println!("carol sees: {line}");
    }

    brian.stop(ActorError::normal_stop().with_detail("quit")).await?;
    brian.terminated().await;
    println!(
        "lobby members: {}",
        system.groups().actors_in_group("lobby").len()
    );

    let topic = lobby.behavior().read().await.topic.clone();
    println!("lobby topic: {topic}");

    system.shutdown(ActorError::normal_stop()).await;
    Ok(())
}
