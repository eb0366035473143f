//! Tracing initialisation.
//!
//! Console and log file get the same fmt layout (level, target, thread id, span close events);
//! the file copy is written without ANSI colours. `RUST_LOG` overrides the default filter.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

/// Filter used when `RUST_LOG` is unset. sqlx logs every statement at info.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// Installs the global subscriber, logging to stdout and appending to `log_file_path`.
///
/// Load `.env` before calling this, otherwise a `RUST_LOG` set there is ignored.
pub fn init_tracing(log_file_path: &str) -> anyhow::Result<()> {
    init_tracing_with(Some(log_file_path))
}

/// Same as [`init_tracing`]; `None` logs to stdout only.
pub fn init_tracing_with(log_file_path: Option<&str>) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(false)
        .with_line_number(false);

    let file_layer = match log_file_path {
        Some(path) => {
            let file = open_log_file(Path::new(path))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_target(true)
                    .with_thread_ids(true)
                    .boxed(),
            )
        }
        None => None,
    };

    Registry::default()
        .with(env_filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set global subscriber: {}", e))?;

    Ok(())
}

/// Opens `path` for appending, creating missing parent directories.
fn open_log_file(path: &Path) -> anyhow::Result<Arc<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Arc::new(file))
}
