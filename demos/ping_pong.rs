use async_trait::async_trait;
use tokio_actor_tree::{
    ActorContext, ActorError, ActorHandle, ActorResult, Behavior, System, INFINITY,
};

/// Simple Ping-Pong example demonstrating bidirectional actor communication.
///
/// This example shows:
/// - Two actors in one manager calling each other
/// - Holding actor handles in state
/// - Shutting the tree down and waiting for it

// Pong actor - simply responds to pings
#[derive(Default)]
struct PongActor {
    pings_received: u64,
}

enum PongMsg {
    Ping,
    GetCount,
}

enum PongReply {
    Pong,
    Count(u64),
}

#[async_trait]
impl Behavior for PongActor {
    type Message = PongMsg;
    type Reply = PongReply;

    async fn handle_msg(
        &mut self,
        msg: Self::Message,
        _ctx: &mut ActorContext<Self>,
    ) -> ActorResult<Self::Reply> {
        match msg {
            PongMsg::Ping => {
                self.pings_received += 1;
                Ok(PongReply::Pong)
            }
            PongMsg::GetCount => Ok(PongReply::Count(self.pings_received)),
        }
    }

    async fn terminate(&mut self, reason: &ActorError, ctx: &mut ActorContext<Self>) {
        println!("{} stopped after {} pings: {reason}", ctx.key(), self.pings_received);
    }
}

// Ping actor
struct PingActor {
    pong: ActorHandle<PongActor>,
    pongs_received: u64,
}

enum PingMsg {
    SendPing,
    GetCount,
}

#[async_trait]
impl Behavior for PingActor {
    type Message = PingMsg;
    type Reply = u64;

    async fn handle_msg(
        &mut self,
        msg: Self::Message,
        _ctx: &mut ActorContext<Self>,
    ) -> ActorResult<Self::Reply> {
        match msg {
            PingMsg::SendPing => {
                // The reply travels back through the call's oneshot.
                if let PongReply::Pong = self.pong.call(PongMsg::Ping, INFINITY).await? {
                    self.pongs_received += 1;
                }
                Ok(self.pongs_received)
            }
            PingMsg::GetCount => Ok(self.pongs_received),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let system = System::new();
    let table = system.root().create_child("table")?;

    // Spawn pong first
    let pong = table.spawn("pong", PongActor::default()).await?;

    // Spawn ping with reference to pong
    let ping = table
        .spawn(
            "ping",
            PingActor {
                pong: pong.clone(),
                pongs_received: 0,
            },
        )
        .await?;

    // Send 10 pings
    for _ in 0..10 {
        ping.call_infinity(PingMsg::SendPing).await?;
    }

    // Check counts
    let count = ping.call_infinity(PingMsg::GetCount).await?;
    println!("ping actor received {count} pongs");

    if let PongReply::Count(count) = pong.call_infinity(PongMsg::GetCount).await? {
        println!("pong actor received {count} pings");
    }

    system.shutdown(ActorError::normal_stop()).await;
    Ok(())
}
