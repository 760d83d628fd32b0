use peerwire_router::{Router, RouterConfig};
use peerwire_socket::Context;
use serde_json::Value;
use tokio::time::timeout;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{router_error, transport_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub async fn run(ctx: &Context, args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let connect_timeout = parse_duration(&args.connect_timeout)?;

    let mut config = RouterConfig::default().with_default_recipient(args.to.as_str());
    if let Some(identity) = &args.identity {
        config = config.with_identity(identity.as_str());
    }
    let mut router = Router::new(ctx, config).map_err(|err| router_error("setup failed", err))?;
    router
        .connect(&args.address)
        .map_err(|err| router_error("connect failed", err))?;

    timeout(connect_timeout, router.socket().wait_for_peer(args.to.as_bytes()))
        .await
        .map_err(|_| CliError::timeout(&format!("peer {:?} unreachable", args.to), connect_timeout))?
        .map_err(|err| transport_error("connect failed", err))?;

    router
        .send(&payload)
        .map_err(|err| router_error("send failed", err))?;

    if args.wait {
        let reply = timeout(wait_timeout, router.recv())
            .await
            .map_err(|_| CliError::timeout("waiting for reply", wait_timeout))?;
        let Some((message, sender)) = reply else {
            return Err(CliError::new(FAILURE, "socket closed before a reply arrived"));
        };
        print_message(&message, &sender, format);
    }

    router.shutdown().await;
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Value> {
    if let Some(json) = &args.json {
        return serde_json::from_str(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")));
    }
    if let Some(data) = &args.data {
        return Ok(Value::String(data.clone()));
    }
    Err(CliError::new(USAGE, "one of --json or --data is required"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn args(json: Option<&str>, data: Option<&str>) -> SendArgs {
        SendArgs {
            address: "tcp://127.0.0.1:4321".into(),
            to: "server".into(),
            json: json.map(str::to_string),
            data: data.map(str::to_string),
            identity: None,
            wait: false,
            wait_timeout: "5s".into(),
            connect_timeout: "5s".into(),
        }
    }

    #[test]
    fn json_payload_is_parsed() {
        let payload = resolve_payload(&args(Some(r#"{"q":1}"#), None)).unwrap();
        assert_eq!(payload, json!({"q": 1}));
    }

    #[test]
    fn invalid_json_is_a_usage_error() {
        let err = resolve_payload(&args(Some("{nope"), None)).unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn data_is_sent_as_a_json_string() {
        let payload = resolve_payload(&args(None, Some("hello"))).unwrap();
        assert_eq!(payload, json!("hello"));
    }
}
