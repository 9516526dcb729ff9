use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, trace, warn};

use button_common::{
    status_topic, AlertIndicator, ButtonPublisher, HealthMonitor, IndicatorDriver,
    MessagingClient, NetworkConfig, NodeConfig, Qos, SystemInfo,
};

/// Simulated indicator: the "LED" is an atomic level toggled by a spawned
/// blink task and reported at trace level.
struct HostIndicator {
    led_level: Arc<AtomicBool>,
}

impl HostIndicator {
    fn new() -> Self {
        Self {
            led_level: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl IndicatorDriver for HostIndicator {
    type Handle = tokio::task::JoinHandle<()>;

    fn start_toggle(&mut self, period_ms: u64) -> Self::Handle {
        let level = self.led_level.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(period_ms));
            loop {
                interval.tick().await;
                let next = !level.load(Ordering::Relaxed);
                level.store(next, Ordering::Relaxed);
                trace!("led toggled {}", if next { "high" } else { "low" });
            }
        })
    }

    fn cancel_toggle(&mut self, handle: Self::Handle) {
        handle.abort();
    }

    fn set_resting_level(&mut self) {
        // Resting level is high: no alert.
        self.led_level.store(true, Ordering::Relaxed);
    }
}

struct HostSystemInfo {
    started_at: Instant,
    device_id: String,
}

impl SystemInfo for HostSystemInfo {
    fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    // Hardware integration point:
    // replace these fixed figures with the ESP allocator statistics on target.
    fn heap_total_bytes(&self) -> u64 {
        327_680
    }

    fn heap_free_bytes(&self) -> u64 {
        221_184
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }
}

struct HostMqtt {
    client: AsyncClient,
}

impl MessagingClient for HostMqtt {
    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos, retain: bool) -> bool {
        self.client
            .try_publish(topic, map_qos(qos), retain, payload)
            .is_ok()
    }
}

fn map_qos(qos: Qos) -> QoS {
    match qos {
        Qos::AtMostOnce => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
        Qos::ExactlyOnce => QoS::ExactlyOnce,
    }
}

// A node that cannot announce itself still runs; the health monitor surfaces
// the broken session on its own.
fn publish_online_status(mqtt: &mut impl MessagingClient, device_id: &str) {
    if !mqtt.publish(&status_topic(device_id), b"online", Qos::AtLeastOnce, true) {
        warn!("failed to publish online status");
    }
}

fn network_config_from_env() -> NetworkConfig {
    let mut network = NetworkConfig::default();

    network.mqtt_host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    if let Some(port) = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
    {
        network.mqtt_port = port;
    }
    if let Ok(user) = std::env::var("MQTT_USER") {
        network.mqtt_user = user;
    }
    if let Ok(pass) = std::env::var("MQTT_PASS") {
        network.mqtt_pass = pass;
    }
    if let Ok(device_id) = std::env::var("DEVICE_ID") {
        network.device_id = device_id;
    }

    network
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut node_config = NodeConfig::default();
    node_config.sanitize();
    let network = network_config_from_env();

    let mut mqtt_options = MqttOptions::new(
        format!("button-node-{}", network.device_id),
        &network.mqtt_host,
        network.mqtt_port,
    );
    if !network.mqtt_user.is_empty() {
        mqtt_options.set_credentials(&network.mqtt_user, &network.mqtt_pass);
    }

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 32);
    let mut mqtt = HostMqtt { client };

    let system = HostSystemInfo {
        started_at: Instant::now(),
        device_id: network.device_id.clone(),
    };
    let indicator = AlertIndicator::new(HostIndicator::new(), node_config.blink_interval_ms);
    let mut monitor = HealthMonitor::new(indicator);
    let publisher = ButtonPublisher::new(system.device_id());

    // The development host has no separate link notifier; the link is treated
    // as up for the process lifetime and only the MQTT session varies.
    monitor.on_link_changed(true);

    publish_online_status(&mut mqtt, system.device_id());

    info!("button node started (device id `{}`)", system.device_id());

    let mut ticker = tokio::time::interval(Duration::from_millis(
        node_config.health_check_interval_ms,
    ));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => monitor.on_session_changed(true),
                Ok(Event::Incoming(Incoming::Disconnect)) => monitor.on_session_changed(false),
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    monitor.on_session_changed(false);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            },
            _ = ticker.tick() => monitor.on_tick(&system),
            // Hardware integration point:
            // each stdin line stands in for a debounced button edge on target.
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(_)) => publisher.on_button_edge(&mut mqtt),
                Ok(None) => stdin_open = false,
                Err(err) => {
                    warn!("stdin read error: {err}");
                    stdin_open = false;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct RejectingMqtt {
        attempts: u32,
    }

    impl MessagingClient for RejectingMqtt {
        fn publish(&mut self, _topic: &str, _payload: &[u8], _qos: Qos, _retain: bool) -> bool {
            self.attempts += 1;
            false
        }
    }

    #[test]
    fn failed_online_status_publish_is_logged_not_fatal() {
        let mut mqtt = RejectingMqtt::default();

        // Returns normally on rejection; startup carries on regardless.
        publish_online_status(&mut mqtt, "node-1");

        assert_eq!(mqtt.attempts, 1);
    }
}
