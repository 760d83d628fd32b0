use peerwire_router::{Router, RouterConfig};
use peerwire_socket::{display_identity, Context};

use crate::cmd::{interrupted, parse_duration, ListenArgs};
use crate::exit::{router_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub async fn run(ctx: &Context, args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let max_age = parse_duration(&args.max_age)?;
    let mut config = RouterConfig::default().with_max_age(max_age);
    if let Some(identity) = args.identity {
        config = config.with_identity(identity);
    }

    let mut router = Router::new(ctx, config).map_err(|err| router_error("setup failed", err))?;
    router
        .bind(&args.address)
        .map_err(|err| router_error("bind failed", err))?;
    for endpoint in router.endpoints() {
        tracing::info!(
            identity = %display_identity(router.identity()),
            %endpoint,
            "listening"
        );
    }

    let stop = interrupted();
    tokio::pin!(stop);
    let mut printed = 0usize;

    loop {
        let next = tokio::select! {
            _ = &mut stop => break,
            next = router.recv() => next,
        };
        let Some((message, sender)) = next else {
            break;
        };

        print_message(&message, &sender, format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    Ok(SUCCESS)
}
