//! Test binary that sends miner-style telemetry datagrams.
//!
//! Usage:
//!   cargo run --bin udp-probe -- --target 127.0.0.1:12345 --count 10
//!
//! Each send varies hashrate and temperature so throttled and immediate
//! updates can be watched in the bridge log.

use clap::Parser;
use log::{info, warn};
use serde_json::json;
use std::time::Duration;
use tokio::net::UdpSocket;

#[derive(Parser)]
#[command(name = "udp-probe")]
#[command(about = "Send sample telemetry datagrams to a UDP telemetry bridge")]
struct Cli {
    /// Bridge address
    #[arg(long, env = "UDP_PROBE_TARGET", default_value = "127.0.0.1:12345")]
    target: String,

    /// Number of datagrams to send
    #[arg(long, default_value_t = 1)]
    count: u32,

    /// Delay between datagrams in milliseconds
    #[arg(long, default_value_t = 1000)]
    delay_ms: u64,

    /// Send this text verbatim instead of a JSON sample
    #[arg(long)]
    raw: Option<String>,
}

fn sample(seq: u32) -> String {
    let hashrate = format!("{},{} GH/s", 1 + seq % 3, seq % 10);
    let rssi = -60 - i64::from(seq % 4);
    json!({
        "hashrate": hashrate,
        "temp": format!("{}.5", 55 + seq % 5),
        "rssi": rssi,
        "freeheap": "142 KB",
        "uptime": format!("{}s\r\n", seq * 10),
        "version": "v2.4.1",
    })
    .to_string()
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let socket = match UdpSocket::bind("0.0.0.0:0").await {
        Ok(s) => s,
        Err(e) => {
            log::error!("Failed to bind probe socket: {}", e);
            std::process::exit(1);
        }
    };

    info!("Sending {} datagram(s) to {}", cli.count, cli.target);

    for seq in 0..cli.count {
        let payload = cli.raw.clone().unwrap_or_else(|| sample(seq));
        match socket.send_to(payload.as_bytes(), cli.target.as_str()).await {
            Ok(len) => info!("[{}] sent {} bytes: {}", seq, len, payload),
            Err(e) => warn!("[{}] send failed: {}", seq, e),
        }

        if seq + 1 < cli.count {
            tokio::time::sleep(Duration::from_millis(cli.delay_ms)).await;
        }
    }
}
