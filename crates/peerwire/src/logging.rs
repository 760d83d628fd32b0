use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Target prefix shared by every crate in the workspace.
const PEERWIRE_TARGET: &str = "peerwire";

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// peerwire events are logged at `level`; everything else at `warn` or
/// quieter.
fn filter(level: LogLevel) -> Targets {
    let others = match level {
        LogLevel::Error => LevelFilter::ERROR,
        _ => LevelFilter::WARN,
    };
    Targets::new()
        .with_default(others)
        .with_target(PEERWIRE_TARGET, level.as_filter())
}

pub fn init_logging(format: LogFormat, level: LogLevel) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false);

    let _ = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(layer.with_filter(filter(level)))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(layer.json().with_filter(filter(level)))
            .try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_stay_at_warn_or_quieter() {
        let verbose = filter(LogLevel::Trace);
        assert!(verbose.would_enable("peerwire_socket::connection", &tracing::Level::TRACE));
        assert!(!verbose.would_enable("tokio::net", &tracing::Level::INFO));
        assert!(verbose.would_enable("tokio::net", &tracing::Level::WARN));

        let quiet = filter(LogLevel::Error);
        assert!(!quiet.would_enable("peerwire_router::router", &tracing::Level::WARN));
        assert!(!quiet.would_enable("tokio::net", &tracing::Level::WARN));
    }
}
