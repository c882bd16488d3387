//! End-to-end tests over a real UDP socket on an ephemeral port.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use udp_telemetry_bridge::config::ListenerConfig;
use udp_telemetry_bridge::input::UdpIntegration;
use udp_telemetry_bridge::sensors::{AttributeDescriptor, AttributeValue, EntityHost};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Discovered(String, Vec<AttributeDescriptor>),
    Added(String, Vec<String>),
    Changed(String, String, AttributeValue),
}

#[derive(Default)]
struct RecordingHost {
    events: Mutex<Vec<Event>>,
}

impl RecordingHost {
    fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

impl EntityHost for RecordingHost {
    fn on_device_discovered(&self, address: &str, attributes: &[AttributeDescriptor]) {
        self.events
            .lock()
            .push(Event::Discovered(address.to_string(), attributes.to_vec()));
    }

    fn on_attributes_added(&self, address: &str, attributes: &[AttributeDescriptor]) {
        self.events.lock().push(Event::Added(
            address.to_string(),
            attributes.iter().map(|a| a.name.clone()).collect(),
        ));
    }

    fn on_attribute_value_changed(&self, address: &str, attribute: &str, value: &AttributeValue) {
        self.events.lock().push(Event::Changed(
            address.to_string(),
            attribute.to_string(),
            value.clone(),
        ));
    }
}

async fn start(update_interval: u64) -> UdpIntegration {
    UdpIntegration::start_unchecked(ListenerConfig {
        port: 0,
        update_interval,
    })
    .await
    .unwrap()
}

async fn send(integration: &UdpIntegration, payload: &[u8]) {
    let port = integration.local_addr().port();
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.send_to(payload, ("127.0.0.1", port)).await.unwrap();
}

/// Poll until `check` holds or a second has passed.
async fn wait_for(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test]
async fn test_miner_payload_is_normalized() {
    let integration = start(5).await;
    let host = Arc::new(RecordingHost::default());
    integration.register_host(host.clone());

    send(
        &integration,
        br#"{"hashrate": "2,3 MH/s", "temp": "45,5\r\n", "FreeHeap": "120 KB"}"#,
    )
    .await;
    assert!(wait_for(|| !host.events().is_empty()).await);

    let events = host.events();
    let Event::Discovered(address, attrs) = &events[0] else {
        panic!("expected discovery, got {:?}", events[0]);
    };
    assert_eq!(address, "127.0.0.1");
    assert_eq!(attrs.len(), 3);
    assert_eq!(attrs[0].value, Some(AttributeValue::Number(2_300_000.0)));
    assert_eq!(attrs[0].unit, Some("H/s"));
    assert_eq!(attrs[1].value, Some(AttributeValue::Number(45.5)));
    assert_eq!(attrs[1].unit, Some("°C"));
    assert_eq!(attrs[2].value, Some(AttributeValue::Text("120 KB".into())));
    assert_eq!(attrs[2].unique_id, "udp_miner_127_0_0_1_FreeHeap");

    integration.shutdown().await;
}

#[tokio::test]
async fn test_malformed_json_becomes_raw_data() {
    let integration = start(5).await;
    send(&integration, b"not-json-at-all").await;

    let registry = integration.registry().clone();
    assert!(wait_for(|| registry.device_count() == 1).await);

    let device = registry.device("127.0.0.1").unwrap();
    assert_eq!(device.attributes.len(), 1);
    assert_eq!(device.attributes[0].name, "raw_data");
    assert_eq!(
        device.attributes[0].applied,
        Some(AttributeValue::Text("not-json-at-all".into()))
    );

    integration.shutdown().await;
}

#[tokio::test]
async fn test_device_before_host_is_announced_once() {
    let integration = start(5).await;
    let registry = integration.registry().clone();

    send(&integration, br#"{"temp": "40"}"#).await;
    assert!(wait_for(|| registry.device_count() == 1).await);
    send(&integration, br#"{"rssi": "-70"}"#).await;
    assert!(
        wait_for(|| registry
            .device("127.0.0.1")
            .is_some_and(|d| d.attributes.len() == 2))
        .await
    );
    assert_eq!(registry.pending_device_count(), 1);

    let host = Arc::new(RecordingHost::default());
    integration.register_host(host.clone());

    let events = host.events();
    assert_eq!(events.len(), 1);
    let Event::Discovered(_, attrs) = &events[0] else {
        panic!("expected discovery, got {:?}", events[0]);
    };
    let names: Vec<_> = attrs.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["temp", "rssi"]);

    // Later attributes are reported individually
    send(&integration, br#"{"version": "2.0"}"#).await;
    assert!(wait_for(|| host.events().len() == 2).await);
    assert_eq!(
        host.events()[1],
        Event::Added("127.0.0.1".into(), vec!["version".into()])
    );

    integration.shutdown().await;
}

#[tokio::test]
async fn test_throttled_value_is_applied_by_sweeper() {
    let integration = start(1).await;
    let host = Arc::new(RecordingHost::default());
    integration.register_host(host.clone());

    send(&integration, br#"{"temp": "40"}"#).await;
    assert!(wait_for(|| host.events().len() == 1).await);

    send(&integration, br#"{"temp": "41"}"#).await;
    let registry = integration.registry().clone();
    assert!(
        wait_for(|| registry
            .device("127.0.0.1")
            .is_some_and(|d| d.attributes[0].pending.is_some()))
        .await
    );
    assert_eq!(host.events().len(), 1);

    // Sweeps run every second; allow for one missed tick
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(
        host.events()[1],
        Event::Changed("127.0.0.1".into(), "temp".into(), AttributeValue::Number(41.0))
    );

    integration.shutdown().await;
    integration.shutdown().await;
}
