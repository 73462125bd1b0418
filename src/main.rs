mod cli;
mod ui;

use anyhow::Result;
use deadfire_order::config;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "deadfire-order.log";

/// Logs go to a file under the app data dir so the TUI screen stays clean.
/// `RUST_LOG` overrides the default `info` level.
fn init_file_logging() -> Option<WorkerGuard> {
    let dir = config::base_data_dir().ok()?;
    if let Err(err) = fs::create_dir_all(&dir) {
        eprintln!("Warning: could not create log dir: {err}");
        return None;
    }

    let appender = tracing_appender::rolling::never(&dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .init();

    Some(guard)
}

fn main() -> Result<()> {
    let _guard = init_file_logging();
    cli::run()
}
