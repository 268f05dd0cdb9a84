//! Log setup for `chainstore-node`.
//!
//! Logs always go to stderr. One-shot subcommands write their JSON result
//! to stdout, so `chainstore-node list | jq` stays parseable at any log
//! level.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `--log-format` / `CHAINSTORE_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Install the global subscriber. Panics if one is already set.
///
/// `RUST_LOG` wins over `default_filter` when present, e.g.
/// `RUST_LOG=chainstore_core=debug` to watch proof-of-work progress.
pub fn init_logging(default_filter: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }

    tracing::debug!(?format, "logging ready");
}
