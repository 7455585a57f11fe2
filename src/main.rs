//! Chat Relay - Entry Point
//!
//! Loads configuration, starts logging, the Transporter and both listeners,
//! then runs until Ctrl-C.

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use chat_relay::{Config, HttpListener, TcpListenerTask, Transporter};

/// Line-oriented chat relay
#[derive(Parser, Debug)]
#[command(name = "chat_relay", version, about)]
struct Args {
    /// YAML config file; built-in defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the TCP listener port
    #[arg(long)]
    tcp_port: Option<u16>,

    /// Override the HTTP listener port
    #[arg(long)]
    http_port: Option<u16>,

    /// Log to stdout instead of the configured log directory
    #[arg(long)]
    stdout: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(port) = args.tcp_port {
        config.tcp_port = port;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    let config = config.normalized()?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let log_dir = (!args.stdout).then(|| PathBuf::from(&config.log_directory));
    let _log_guard = chat_relay::logging::init_logging(
        log_dir.as_deref(),
        &config.log_level,
        config.log_json,
    )?;

    let shutdown = CancellationToken::new();

    // Start the Transporter
    let (transporter, relay) = Transporter::new(config.transporter_settings());
    let transporter_task = tokio::spawn(transporter.run());

    // Start the listeners
    let tcp = TcpListenerTask::bind(config.tcp_bind_address()).await?;
    let tcp_task = tokio::spawn(tcp.run(relay.new_connections(), shutdown.clone()));

    let http = HttpListener::bind(config.http_bind_address()).await?;
    let http_task = {
        let shutdown = shutdown.clone();
        let messages = relay.messages();
        tokio::spawn(async move {
            if let Err(e) = http.run(messages, shutdown).await {
                error!("HTTP listener error: {}", e);
            }
        })
    };

    info!(
        tcp = %config.tcp_bind_address(),
        http = %config.http_bind_address(),
        "chat relay started"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    // Listeners first, then let in-flight broadcasts drain
    shutdown.cancel();
    let _ = tcp_task.await;
    let _ = http_task.await;

    relay.stop();
    let _ = transporter_task.await;

    info!("chat relay stopped");
    Ok(())
}
