//! Tsukumo - media upload service
//!
//! Accepts thumbnail and video uploads for video records and stores them on
//! local disk or S3.

use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use tsukumo::metrics::server::MetricsServer;
use tsukumo::{config::Config, server::Server};

/// Tsukumo - thumbnail and video upload service
#[derive(Parser, Debug)]
#[command(name = "tsukumo")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Tsukumo v{}", tsukumo::VERSION);

    let config = Config::load(&args.config)?;
    info!(path = ?args.config, "Loaded configuration");

    let mut metrics_server = if config.metrics.enabled {
        let mut server = MetricsServer::from_config(&config.metrics);
        let addr = server.start().await?;
        info!(address = %addr, "Metrics server listening");
        Some(server)
    } else {
        warn!("Metrics disabled");
        None
    };

    let server = Server::new(&config).await?;
    server.run().await?;

    if let Some(server) = metrics_server.as_mut() {
        server.shutdown().await;
    }

    Ok(())
}
