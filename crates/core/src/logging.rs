use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber for a binary.
///
/// Writes to `<log_dir>/<component>.log.<date>` and optionally mirrors to
/// stderr. Returns `None` if a subscriber is already installed (tests, or a
/// host that set up its own).
pub fn init_logging(component: &str, log_dir: &Path, to_stderr: bool) -> Option<WorkerGuard> {
    let _ = std::fs::create_dir_all(log_dir);

    let file_appender = tracing_appender::rolling::daily(log_dir, component);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    let installed = if to_stderr {
        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
            .compact();
        registry.with(stderr_layer).try_init().is_ok()
    } else {
        registry.try_init().is_ok()
    };

    installed.then_some(guard)
}
