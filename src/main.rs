// src/main.rs

//! The main entry point for a FileStor handler process.

use anyhow::Result;
use filestor_handler::config::Config;
use filestor_handler::core::external::BitSplitBucketIdFactory;
use filestor_handler::core::handler::Handler;
use filestor_handler::core::sender::LoggingMessageSender;
use std::env;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{filter::EnvFilter, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    run_app().await
}

async fn run_app() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("filestor-handler version {VERSION}");
        return Ok(());
    }

    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
        .unwrap_or("config.toml");

    let config = match Config::from_file(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{config_path}\": {e}");
            std::process::exit(1);
        }
    };

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::registry()
        .with(EnvFilter::new(log_level))
        .with(tracing_subscriber::fmt::layer().compact().with_ansi(true))
        .init();

    info!(
        num_disks = config.num_disks,
        stripes_per_disk = config.stripes_per_disk,
        "starting filestor handler"
    );

    let handler = Handler::new(
        config.num_disks,
        config.stripes_per_disk,
        config.next_message_timeout(),
        Arc::new(LoggingMessageSender),
        Arc::new(BitSplitBucketIdFactory),
    );

    if let Err(e) = filestor_handler::server::run(&config.status_bind_addr, handler.clone()).await {
        error!("status/metrics server error: {e}");
        return Err(e);
    }

    handler.close();
    Ok(())
}
