//! Ingestion dispatcher.
//!
//! Decodes datagrams into attribute payloads and hands them to the registry.
//! Every sender address gets its own worker task fed by a channel, so packets
//! from one device are applied strictly in receive order while a slow device
//! never holds up the others or the socket.

use super::listener::{DatagramHandler, Packet};
use crate::device::DeviceRegistry;
use log::{debug, error, warn};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

/// Attribute name used when a payload is not a JSON object.
pub const RAW_DATA_ATTRIBUTE: &str = "raw_data";

/// Decode a datagram into an attribute map.
///
/// Returns `None` for non-UTF-8 payloads. Text that is not a JSON object
/// becomes a single `raw_data` attribute.
pub fn parse_payload(sender: &str, bytes: &[u8]) -> Option<Map<String, Value>> {
    let text = match std::str::from_utf8(bytes) {
        Ok(t) => t.trim(),
        Err(_) => {
            warn!("[UDP] Non-UTF-8 data received from {}", sender);
            return None;
        }
    };

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) | Err(_) => {
            warn!("[UDP] Invalid JSON from {}: {}", sender, text);
            let mut map = Map::new();
            map.insert(RAW_DATA_ATTRIBUTE.to_string(), Value::String(text.to_string()));
            Some(map)
        }
    }
}

/// How long a worker waits for its next packet before it retires.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

type WorkerMap = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Packet>>>>;

pub struct Dispatcher {
    registry: Arc<DeviceRegistry>,
    workers: WorkerMap,
    tasks: TaskTracker,
    idle_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self::with_idle_timeout(registry, DEFAULT_IDLE_TIMEOUT)
    }

    /// Workers that see no packet for `idle_timeout` are retired and
    /// restarted by the next packet from their address.
    pub fn with_idle_timeout(registry: Arc<DeviceRegistry>, idle_timeout: Duration) -> Self {
        Self {
            registry,
            workers: Arc::new(Mutex::new(HashMap::new())),
            tasks: TaskTracker::new(),
            idle_timeout,
        }
    }

    /// Queue a packet on its sender's worker, starting one if needed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, packet: Packet) {
        if self.tasks.is_closed() {
            debug!("[UDP] Dispatcher closed, dropping packet from {}", packet.sender);
            return;
        }

        let address = packet.sender.to_string();
        let mut workers = self.workers.lock();

        let packet = match workers.get(&address) {
            Some(tx) => match tx.send(packet) {
                Ok(()) => return,
                Err(mpsc::error::SendError(packet)) => {
                    warn!("[UDP] Worker for {} stopped unexpectedly, restarting", address);
                    packet
                }
            },
            None => packet,
        };

        let tx = self.spawn_worker(address.clone());
        if tx.send(packet).is_ok() {
            workers.insert(address, tx);
        }
    }

    fn spawn_worker(&self, address: String) -> mpsc::UnboundedSender<Packet> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Packet>();
        let registry = self.registry.clone();
        let workers = self.workers.clone();
        let idle_timeout = self.idle_timeout;

        self.tasks.spawn(async move {
            debug!("[UDP] Worker for {} started", address);
            loop {
                let packet = match tokio::time::timeout(idle_timeout, rx.recv()).await {
                    Ok(Some(packet)) => packet,
                    Ok(None) => break,
                    Err(_) => {
                        // dispatch only sends under this lock, so an empty
                        // queue here stays empty once the entry is removed
                        let mut map = workers.lock();
                        match rx.try_recv() {
                            Ok(packet) => packet,
                            Err(_) => {
                                map.remove(&address);
                                debug!("[UDP] Worker for {} idle, retiring", address);
                                break;
                            }
                        }
                    }
                };

                if catch_unwind(AssertUnwindSafe(|| handle_packet(&registry, &address, &packet)))
                    .is_err()
                {
                    error!("[UDP] Panic while handling packet from {}", address);
                }
            }
            debug!("[UDP] Worker for {} stopped", address);
        });

        tx
    }

    /// Number of live per-address workers.
    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// Stop accepting packets and let workers drain their queues.
    pub async fn close(&self) {
        self.tasks.close();
        self.workers.lock().clear();
        self.tasks.wait().await;
    }
}

impl DatagramHandler for Dispatcher {
    fn datagram_received(&self, packet: Packet) {
        self.dispatch(packet);
    }
}

fn handle_packet(registry: &DeviceRegistry, address: &str, packet: &Packet) {
    let Some(payload) = parse_payload(address, &packet.payload) else {
        return;
    };

    if registry.observe(address, &payload, packet.received_at) {
        debug!("[UDP] Registered device {}", address);
    }
}
