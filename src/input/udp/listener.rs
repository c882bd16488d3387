//! UDP listener.
//!
//! Binds one socket on all interfaces and forwards every datagram to a
//! [`DatagramHandler`] without waiting for it to be processed.

use crate::error::{BridgeError, Result};
use chrono::{DateTime, Utc};
use log::{debug, error, info, trace};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

/// Largest possible UDP payload.
const MAX_DATAGRAM_SIZE: usize = 65_535;

const RECV_BACKOFF_BASE: Duration = Duration::from_millis(10);
const RECV_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Pause after the `consecutive`-th receive error in a row.
fn recv_backoff(consecutive: u32) -> Duration {
    let exp = consecutive.saturating_sub(1).min(16);
    (RECV_BACKOFF_BASE * 2u32.pow(exp)).min(RECV_BACKOFF_MAX)
}

/// A received datagram. Not retained after dispatch.
#[derive(Debug, Clone)]
pub struct Packet {
    pub sender: IpAddr,
    pub payload: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

/// Something that accepts received datagrams.
///
/// Implementations must return quickly; the receive loop calls this inline.
pub trait DatagramHandler: Send + Sync {
    fn datagram_received(&self, packet: Packet);
}

pub struct UdpListener {
    socket: UdpSocket,
    port: u16,
}

impl UdpListener {
    /// Bind to `0.0.0.0:port`.
    pub async fn bind(port: u16) -> Result<Self> {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| BridgeError::BindFailed { port, source })?;
        info!("[UDP] Listener running on {}", socket.local_addr()?);
        Ok(Self { socket, port })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive until `cancel` fires. The socket is closed when this returns.
    pub async fn run<H: DatagramHandler + ?Sized>(self, handler: Arc<H>, cancel: CancellationToken) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut errors: u32 = 0;

        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => received,
            };

            match received {
                Ok((len, from)) => {
                    errors = 0;
                    debug!("[UDP RX] {} bytes from {}", len, from);
                    let preview_len = len.min(64);
                    trace!("[UDP RX] payload: {:02x?}", &buf[..preview_len]);

                    handler.datagram_received(Packet {
                        sender: from.ip(),
                        payload: buf[..len].to_vec(),
                        received_at: Utc::now(),
                    });
                }
                Err(e) => {
                    // e.g. ICMP port unreachable surfaced on some platforms; keep listening
                    errors = errors.saturating_add(1);
                    if errors == 1 {
                        error!("[UDP RX] Error receiving packet: {:?}", e);
                    } else {
                        debug!("[UDP RX] Error receiving packet ({} in a row): {:?}", errors, e);
                    }

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(recv_backoff(errors)) => {}
                    }
                }
            }
        }

        info!("[UDP] Listener on port {} closed", self.port);
    }
}
