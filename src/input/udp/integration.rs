//! UDP integration orchestrator.
//!
//! One [`UdpIntegration`] is one running listener instance: its socket, its
//! device registry, its dispatcher and its sweeper. Nothing is shared between
//! instances, so several can run side by side on different ports.

use super::dispatcher::Dispatcher;
use super::listener::UdpListener;
use super::sweeper::spawn_sweeper;
use crate::config::ListenerConfig;
use crate::device::DeviceRegistry;
use crate::error::Result;
use crate::sensors::EntityHost;
use log::{debug, error, info};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct UdpIntegration {
    config: ListenerConfig,
    local_addr: SocketAddr,
    registry: Arc<DeviceRegistry>,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
    listener_task: Mutex<Option<JoinHandle<()>>>,
    sweeper_task: Mutex<Option<JoinHandle<()>>>,
}

impl UdpIntegration {
    /// Validate the configuration, bind the socket and start the sweeper.
    pub async fn start(config: ListenerConfig) -> Result<Self> {
        config.validate()?;
        Self::start_unchecked(config).await
    }

    /// Like [`start`](Self::start) but skips range validation, so tests can
    /// bind an ephemeral port with port 0.
    pub async fn start_unchecked(config: ListenerConfig) -> Result<Self> {
        info!(
            "[UDP] Setting up listener on port {} (update interval: {}s)",
            config.port, config.update_interval
        );

        let listener = UdpListener::bind(config.port).await?;
        let local_addr = listener.local_addr()?;

        let registry = Arc::new(DeviceRegistry::new(config.interval()));
        let dispatcher = Arc::new(Dispatcher::new(registry.clone()));
        let cancel = CancellationToken::new();

        let listener_task = tokio::spawn(listener.run(dispatcher.clone(), cancel.clone()));
        let sweeper_task = spawn_sweeper(registry.clone(), config.interval(), cancel.clone());

        Ok(Self {
            config,
            local_addr,
            registry,
            dispatcher,
            cancel,
            listener_task: Mutex::new(Some(listener_task)),
            sweeper_task: Mutex::new(Some(sweeper_task)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Hand over the entity host. Devices seen so far are announced now.
    pub fn register_host(&self, host: Arc<dyn EntityHost>) {
        self.registry.register_host(host);
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Stop the sweeper and close the socket.
    ///
    /// Safe to call more than once. Teardown failures are logged, never
    /// returned.
    pub async fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            debug!("[UDP] Listener on port {} already shut down", self.config.port);
        }
        self.cancel.cancel();

        let sweeper = self.sweeper_task.lock().take();
        if let Some(task) = sweeper
            && let Err(e) = task.await
        {
            error!("[UDP] Sweeper task failed during shutdown: {}", e);
        }

        let listener = self.listener_task.lock().take();
        if let Some(task) = listener
            && let Err(e) = task.await
        {
            error!("[UDP] Listener task failed during shutdown: {}", e);
        }

        self.dispatcher.close().await;
        info!("[UDP] Listener on port {} shut down", self.config.port);
    }
}

impl Drop for UdpIntegration {
    fn drop(&mut self) {
        // Stops both tasks if shutdown() was never awaited
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use tokio_test::assert_ok;

    fn ephemeral() -> ListenerConfig {
        ListenerConfig {
            port: 0,
            update_interval: 1,
        }
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let result = UdpIntegration::start(ListenerConfig {
            port: 80,
            update_interval: 5,
        })
        .await;
        assert!(matches!(result, Err(BridgeError::InvalidPort(80))));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let integration = UdpIntegration::start_unchecked(ephemeral()).await.unwrap();
        assert!(integration.is_running());

        integration.shutdown().await;
        assert!(!integration.is_running());
        integration.shutdown().await;
        assert!(!integration.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_releases_port() {
        let integration = UdpIntegration::start_unchecked(ephemeral()).await.unwrap();
        let port = integration.local_addr().port();
        integration.shutdown().await;

        assert_ok!(UdpListener::bind(port).await);
    }

    #[tokio::test]
    async fn test_port_in_use_is_reported() {
        let first = UdpIntegration::start_unchecked(ephemeral()).await.unwrap();
        let port = first.local_addr().port();

        let second = UdpIntegration::start_unchecked(ListenerConfig {
            port,
            update_interval: 1,
        })
        .await;
        assert!(matches!(second, Err(BridgeError::BindFailed { port: p, .. }) if p == port));

        first.shutdown().await;
    }
}
