//! Log sink setup
//!
//! Logs go to stdout, or to a daily rolling file (`YYYY-MM-DD.log`) inside a
//! log directory, as either human-readable text or JSON. `RUST_LOG` overrides
//! the configured level.

use std::path::Path;
use std::str::FromStr;

use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::RelayError;

/// Boxed subscriber ready to be installed
pub type BoxSubscriber = Box<dyn Subscriber + Send + Sync>;

/// Install the global subscriber
///
/// The returned guard must be kept alive; dropping it flushes and stops the
/// background file writer.
pub fn init_logging(
    directory: Option<&Path>,
    level: &str,
    json: bool,
) -> Result<Option<WorkerGuard>, RelayError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let (subscriber, guard) = build_subscriber(directory, level, json, filter)?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| RelayError::LoggingInit(e.to_string()))?;
    Ok(guard)
}

/// Build a subscriber without installing it
pub fn build_subscriber(
    directory: Option<&Path>,
    level: &str,
    json: bool,
    filter: EnvFilter,
) -> Result<(BoxSubscriber, Option<WorkerGuard>), RelayError> {
    if tracing::Level::from_str(level).is_err() {
        return Err(RelayError::InvalidLogLevel(level.to_string()));
    }

    let (writer, guard) = match directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_suffix("log")
                .build(dir)
                .map_err(|e| RelayError::LoggingInit(e.to_string()))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    let layer = fmt::layer()
        .with_target(true)
        .with_ansi(directory.is_none())
        .with_writer(writer);
    let registry = tracing_subscriber::registry().with(filter);

    let subscriber: BoxSubscriber = if json {
        Box::new(registry.with(layer.json()))
    } else {
        Box::new(registry.with(layer))
    };

    Ok((subscriber, guard))
}
