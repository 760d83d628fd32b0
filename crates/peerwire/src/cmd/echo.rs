use peerwire_router::{Router, RouterConfig};
use peerwire_socket::{display_identity, Context};
use serde_json::{json, Value};

use crate::cmd::{interrupted, EchoArgs};
use crate::exit::{router_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub async fn run(ctx: &Context, args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let config = RouterConfig::default().with_identity(args.identity);
    let mut router = Router::new(ctx, config).map_err(|err| router_error("setup failed", err))?;
    router
        .bind(&args.address)
        .map_err(|err| router_error("bind failed", err))?;
    for endpoint in router.endpoints() {
        tracing::info!(
            identity = %display_identity(router.identity()),
            %endpoint,
            "echo server listening"
        );
    }

    let stop = interrupted();
    tokio::pin!(stop);
    let mut echoed = 0usize;

    loop {
        let next = tokio::select! {
            _ = &mut stop => break,
            next = router.recv() => next,
        };
        let Some((message, sender)) = next else {
            break;
        };

        tracing::info!(sender = %display_identity(&sender), "echoing message");
        if let Err(err) = router.send_to(&echo_reply(message), &sender) {
            tracing::warn!(sender = %display_identity(&sender), error = %err, "echo reply failed");
            continue;
        }
        echoed = echoed.saturating_add(1);

        if args.count.is_some_and(|count| echoed >= count) {
            router.shutdown().await;
            break;
        }
    }

    Ok(SUCCESS)
}

fn echo_reply(message: Value) -> Value {
    json!({ "echo": message })
}
