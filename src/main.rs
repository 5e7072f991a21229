//! Dynamic Mock Server - CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use dynamic_mock_server::{
    MockServer, MockServerConfig, TunnelConfig, TunnelLauncher, VkTunnelLauncher,
};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "dynamic-mock-server",
    about = "Local HTTP mock server with runtime stub registration and request logs",
    version
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "mock-server.yaml")]
    config: PathBuf,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8082)]
    port: u16,

    /// Expose the server through vk-tunnel
    #[arg(short, long)]
    tunnel: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        let default_config = include_str!("../config/default-config.yaml");
        println!("{}", default_config);
        return Ok(());
    }

    // Load configuration
    let config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        MockServerConfig::from_file(&args.config)?
    } else if args.validate {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration (no mocks)");
        MockServerConfig::default()
    };

    if args.validate {
        config.validate()?;
        println!(
            "Configuration is valid ({} mocks defined)",
            config.mocks.len()
        );
        return Ok(());
    }

    let server = MockServer::new(config)?;

    let addr = SocketAddr::new(args.host, args.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(address = %addr, "Dynamic mock server running");
    info!("Web UI available at: http://localhost:{}/__mock/ui", args.port);

    if args.tunnel {
        info!("Tunnel mode enabled - external access will be available shortly");
        let tunnel = TunnelConfig::for_port(args.port);
        tokio::spawn(async move {
            if let Err(e) = VkTunnelLauncher::new().start(&tunnel).await {
                error!(error = %e, "Tunnel launch failed");
            }
        });
    }

    // Shutdown is abrupt: in-flight requests are not drained.
    tokio::select! {
        result = server.serve(listener) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    Ok(())
}
