use std::time::Duration;

use clap::{ArgGroup, Args, Subcommand};
use peerwire_socket::Context;

use crate::exit::{transport_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bind and reply `{"echo": <message>}` to every sender.
    Echo(EchoArgs),
    /// Send one JSON message to a peer.
    Send(SendArgs),
    /// Bind and print received messages.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    let runtime = match command {
        Command::Version(args) => return version::run(args),
        _ => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|err| CliError::new(INTERNAL, format!("runtime setup failed: {err}")))?,
    };

    runtime.block_on(async move {
        let ctx = Context::current().map_err(|err| transport_error("context setup failed", err))?;
        let result = match command {
            Command::Echo(args) => echo::run(&ctx, args, format).await,
            Command::Send(args) => send::run(&ctx, args, format).await,
            Command::Listen(args) => listen::run(&ctx, args, format).await,
            Command::Version(args) => version::run(args),
        };
        ctx.shutdown();
        result
    })
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Endpoint to bind (e.g. tcp://*:4321, ipc:///tmp/peerwire.sock).
    pub address: String,
    /// Identity announced to peers.
    #[arg(long, default_value = "server")]
    pub identity: String,
    /// Exit after echoing N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("payload").required(true).args(["json", "data"])))]
pub struct SendArgs {
    /// Endpoint to connect to.
    pub address: String,
    /// Identity of the receiving peer.
    #[arg(long)]
    pub to: String,
    /// JSON payload.
    #[arg(long, conflicts_with = "data")]
    pub json: Option<String>,
    /// Text payload, sent as a JSON string.
    #[arg(long, conflicts_with = "json")]
    pub data: Option<String>,
    /// Identity announced to peers. Generated when omitted.
    #[arg(long)]
    pub identity: Option<String>,
    /// Wait for one reply and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for a reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    /// Maximum time to wait for the recipient to become reachable.
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Endpoint to bind.
    pub address: String,
    /// Identity announced to peers. Generated when omitted.
    #[arg(long)]
    pub identity: Option<String>,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Discard messages older than this on arrival. Send times have
    /// one-second resolution; sub-second values are compared exactly.
    #[arg(long, default_value = "15s")]
    pub max_age: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
pub(crate) async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "signal handler setup failed");
        std::future::pending::<()>().await;
    }
    tracing::info!("interrupted");
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration(" 3 ").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        for bad in ["", "0s", "bad", "5m", "-1s"] {
            let err = parse_duration(bad).unwrap_err();
            assert_eq!(err.code, USAGE, "{bad:?} should be a usage error");
        }
    }
}
