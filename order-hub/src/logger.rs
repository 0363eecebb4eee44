//! Logging infrastructure
//!
//! Console output always; optional daily rolling file under `log_dir`.
//! JSON output for log shippers when `json` is set.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive in `main`.
pub fn init_logger(filter: &str, json: bool, log_dir: Option<&str>) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_new(filter)
        .unwrap_or_else(|_| EnvFilter::new(crate::config::DEFAULT_LOG_FILTER));

    let (file_writer, guard) = match log_dir.map(Path::new) {
        Some(dir) if std::fs::create_dir_all(dir).is_ok() => {
            let appender = tracing_appender::rolling::daily(dir, "order-hub");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        _ => (None, None),
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(fmt::layer().json().with_target(true))
            .with(file_writer.map(|w| fmt::layer().json().with_ansi(false).with_writer(w)))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false))
            .with(file_writer.map(|w| fmt::layer().with_ansi(false).with_writer(w)))
            .init();
    }

    guard
}
