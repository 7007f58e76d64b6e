//! Subscriber setup for `tracing`.
//!
//! Library code only emits events and spans; binaries call [`init_logger`] once at
//! startup. `RUST_LOG` wins over the configured filter when it is set.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used in verbose mode when `RUST_LOG` is unset.
pub const VERBOSE_FILTER: &str = "schoolhouse=debug,info";

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Single-line human-readable output.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// Chooses the filter directive for the subscriber.
pub fn filter_directive(configured: &str, verbose: bool) -> &str {
    if verbose { VERBOSE_FILTER } else { configured }
}

/// Installs the global subscriber, writing to stderr.
///
/// Fails if a global subscriber was already installed.
pub fn init_logger(configured: &str, verbose: bool, format: LogFormat) -> Result<(), TryInitError> {
    let directive = filter_directive(configured, verbose);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact(),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .json(),
            )
            .try_init(),
    }
}
