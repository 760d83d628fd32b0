//! A server and a client in one process: the client sends a request, the
//! server echoes it back wrapped in `{"echo": ...}`.
//!
//! Run with:
//!   cargo run -p peerwire --example echo-pair

use std::time::Duration;

use peerwire::{Context, Router, RouterConfig};
use serde_json::json;

const ADDRESS: &str = "tcp://127.0.0.1:4321";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::current()?;

    let mut server = Router::new(&ctx, RouterConfig::default().with_identity("server"))?;
    server.bind(ADDRESS)?;

    let mut client = Router::new(
        &ctx,
        RouterConfig::default().with_default_recipient("server"),
    )?;
    client.connect(ADDRESS)?;
    tokio::time::timeout(Duration::from_secs(3), client.socket().wait_for_peer(b"server")).await??;

    let server_task = tokio::spawn(async move {
        while let Some((message, sender)) = server.recv().await {
            eprintln!("server got {message} from {sender:?}");
            if let Err(err) = server.send_to(&json!({ "echo": message }), &sender) {
                eprintln!("reply failed: {err}");
            }
        }
    });

    for q in 1..=3 {
        client.send(&json!({ "q": q }))?;
        if let Some((reply, sender)) = client.recv().await {
            println!("client got {reply} from {sender:?}");
        }
    }

    ctx.shutdown();
    server_task.await?;
    Ok(())
}
