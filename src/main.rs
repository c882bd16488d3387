use clap::Parser;
use log::info;
use std::sync::Arc;
use tokio::signal;
use udp_telemetry_bridge::config::{self, Config};
use udp_telemetry_bridge::input::UdpIntegration;
use udp_telemetry_bridge::sensors::LoggingHost;

#[derive(Parser)]
#[command(name = "udp-telemetry-bridge")]
#[command(about = "Listens for UDP telemetry datagrams and tracks each device's attributes")]
struct Cli {
    /// UDP port to listen on (all interfaces)
    #[arg(long, env = "UDP_LISTENER_PORT")]
    port: Option<u16>,

    /// Minimum seconds between applied updates of one attribute
    #[arg(long, env = "UDP_UPDATE_INTERVAL")]
    update_interval: Option<u64>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env file before anything else
    config::load_dotenv();
    init_logger();
    info!("Starting UDP Telemetry Bridge");

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    if let Some(interval) = cli.update_interval {
        config.listener.update_interval = interval;
    }

    info!("Configuration loaded:");
    info!("  Port: {}", config.listener.port);
    info!("  Update interval: {}s", config.listener.update_interval);

    let integration = match UdpIntegration::start(config.listener).await {
        Ok(integration) => integration,
        Err(e) => {
            log::error!("Failed to start UDP listener: {}", e);
            std::process::exit(1);
        }
    };
    integration.register_host(Arc::new(LoggingHost));

    info!("UDP Telemetry Bridge is running");
    info!("  - Listening on {}", integration.local_addr());
    info!("  - Press Ctrl+C to exit");

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal");
        }
        Err(e) => {
            log::error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    integration.shutdown().await;
    info!(
        "UDP Telemetry Bridge stopped ({} device(s) seen)",
        integration.registry().device_count()
    );
}
