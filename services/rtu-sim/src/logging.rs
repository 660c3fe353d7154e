//! Logging setup: console layer plus an optional daily-rolling file
//! layer, both env-filter controlled.

use iec104_config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global `tracing` subscriber with a rolling file layer
/// and, when enabled, a console layer, both controlled by one env-filter.
/// The returned guard must be held for the lifetime of `main` — dropping
/// it stops the background writer thread and silently truncates buffered
/// log lines.
pub fn init(config: &LoggingConfig, module: &str) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(&config.log_dir)?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{module}={level}", level = config.level)));

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, format!("{module}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
    let console_layer = config.console.then(|| fmt::layer().with_writer(std::io::stdout));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    tracing::info!(module, log_dir = %config.log_dir, "logging initialized");
    Ok(guard)
}
