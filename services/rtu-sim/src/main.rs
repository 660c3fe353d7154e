mod bootstrap;
mod logging;
mod shutdown;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Simulated IEC-104 field device (RTU/IED).
#[derive(Parser)]
#[command(name = "rtu-sim", version, about = "Simulated IEC-104 field device")]
struct Args {
    /// Path to the device's YAML configuration file. Overrides CONFIG_PATH.
    #[arg(short = 'c', long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => iec104_config::load_from(path),
        None => iec104_config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            std::process::exit(2);
        },
    };

    let _log_guard = match logging::init(&config.logging, &config.module) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            std::process::exit(2);
        },
    };

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(bootstrap::run(config, cancel.child_token()));

    shutdown::wait_for_shutdown().await;
    info!("shutdown signal received");
    cancel.cancel();

    match handle.await {
        Ok(Ok(())) => info!("clean shutdown"),
        Ok(Err(e)) => {
            error!("device task returned an error: {e}");
            std::process::exit(1);
        },
        Err(e) => {
            error!("device task panicked: {e}");
            std::process::exit(1);
        },
    }
}
