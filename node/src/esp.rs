use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use embedded_svc::{
    mqtt::client::QoS,
    wifi::{AuthMethod, ClientConfiguration, Configuration},
};
use esp_idf_hal::gpio::{
    AnyIOPin, AnyOutputPin, IOPin, Input, InterruptType, Output, OutputPin, PinDriver, Pull,
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    log::EspLogger,
    mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration},
    netif::IpEvent,
    nvs::EspDefaultNvsPartition,
    timer::{EspTaskTimerService, EspTimer},
    wifi::{BlockingWifi, EspWifi, WifiEvent},
};
use log::{info, warn};

use button_common::{
    status_topic, AlertIndicator, ButtonPublisher, HealthMonitor, IndicatorDriver,
    MessagingClient, NetworkConfig, Qos, RuntimeConfig, SystemInfo,
};

const WIFI_CONNECT_ATTEMPTS: u32 = 5;
const WIFI_RETRY_DELAY_MS: u64 = 3_000;

type SharedLed = Arc<Mutex<PinDriver<'static, AnyOutputPin, Output>>>;
type SharedMonitor = Arc<Mutex<HealthMonitor<EspIndicator>>>;

struct EspIndicator {
    led: SharedLed,
    timers: EspTaskTimerService,
}

impl IndicatorDriver for EspIndicator {
    type Handle = EspTimer<'static>;

    fn start_toggle(&mut self, period_ms: u64) -> Self::Handle {
        let led = self.led.clone();
        let timer = self
            .timers
            .timer(move || {
                if let Ok(mut led) = led.lock() {
                    let _ = led.toggle();
                }
            })
            .expect("failed to create indicator timer");
        timer
            .every(Duration::from_millis(period_ms))
            .expect("failed to schedule indicator timer");
        timer
    }

    fn cancel_toggle(&mut self, handle: Self::Handle) {
        let _ = handle.cancel();
    }

    fn set_resting_level(&mut self) {
        if let Ok(mut led) = self.led.lock() {
            let _ = led.set_high();
        }
    }
}

#[derive(Clone)]
struct EspSystemInfo {
    device_id: String,
}

impl SystemInfo for EspSystemInfo {
    fn uptime_seconds(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() } / 1_000_000) as u64
    }

    fn heap_total_bytes(&self) -> u64 {
        unsafe { esp_idf_svc::sys::heap_caps_get_total_size(esp_idf_svc::sys::MALLOC_CAP_DEFAULT) }
            as u64
    }

    fn heap_free_bytes(&self) -> u64 {
        unsafe { esp_idf_svc::sys::esp_get_free_heap_size() as u64 }
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }
}

struct EspMqtt {
    client: EspMqttClient<'static>,
}

impl MessagingClient for EspMqtt {
    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos, retain: bool) -> bool {
        self.client
            .publish(topic, map_qos(qos), retain, payload)
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

fn ensure_defaults(runtime: &mut RuntimeConfig) {
    if runtime.network.wifi_ssid.is_empty() {
        runtime.network.wifi_ssid = option_env!("WIFI_SSID").unwrap_or("CHANGE_ME").to_string();
    }
    if runtime.network.wifi_pass.is_empty() {
        runtime.network.wifi_pass = option_env!("WIFI_PASS").unwrap_or("CHANGE_ME").to_string();
    }
    if let Some(device_id) = option_env!("DEVICE_ID") {
        runtime.network.device_id = device_id.to_string();
    }
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let mut runtime = RuntimeConfig::default();
    runtime.node.sanitize();
    ensure_defaults(&mut runtime);

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let Peripherals { modem, pins, .. } = Peripherals::take()?;

    let led = PinDriver::output(pins.gpio2.downgrade_output())
        .context("failed to configure led pin")?;
    let led: SharedLed = Arc::new(Mutex::new(led));

    let mut button = configure_button(pins.gpio0.downgrade())?;

    let _wifi = connect_wifi(modem, sys_loop.clone(), nvs_partition, &runtime.network)
        .context("wifi startup failed")?;

    let timers = EspTaskTimerService::new().context("failed to acquire timer service")?;
    let indicator = AlertIndicator::new(
        EspIndicator {
            led,
            timers: timers.clone(),
        },
        runtime.node.blink_interval_ms,
    );
    let monitor: SharedMonitor = Arc::new(Mutex::new(HealthMonitor::new(indicator)));

    // Wifi is connected by the time the subscriptions are wired.
    if let Ok(mut monitor) = monitor.lock() {
        monitor.on_link_changed(true);
    }

    let monitor_for_ip = monitor.clone();
    let _ip_sub = sys_loop.subscribe::<IpEvent, _>(move |event| {
        if matches!(event, IpEvent::DhcpIpAssigned(_)) {
            if let Ok(mut monitor) = monitor_for_ip.lock() {
                monitor.on_link_changed(true);
            }
        }
    })?;

    let monitor_for_wifi = monitor.clone();
    let _wifi_sub = sys_loop.subscribe::<WifiEvent, _>(move |event| {
        if matches!(event, WifiEvent::StaDisconnected(_)) {
            if let Ok(mut monitor) = monitor_for_wifi.lock() {
                monitor.on_link_changed(false);
            }
        }
    })?;

    let (mqtt_client, mut mqtt_conn) = create_mqtt_client(&runtime.network)?;
    let mut mqtt = EspMqtt {
        client: mqtt_client,
    };

    let monitor_for_mqtt = monitor.clone();
    thread::Builder::new()
        .name("mqtt-poll".to_string())
        .stack_size(8192)
        .spawn(move || loop {
            match mqtt_conn.next() {
                Ok(event) => match event.payload() {
                    EventPayload::Connected(_) => {
                        if let Ok(mut monitor) = monitor_for_mqtt.lock() {
                            monitor.on_session_changed(true);
                        }
                    }
                    EventPayload::Disconnected => {
                        if let Ok(mut monitor) = monitor_for_mqtt.lock() {
                            monitor.on_session_changed(false);
                        }
                    }
                    _ => {}
                },
                Err(err) => {
                    warn!("mqtt poll error: {err:?}");
                    thread::sleep(Duration::from_secs(2));
                }
            }
        })
        .expect("failed to spawn mqtt thread");

    let system = EspSystemInfo {
        device_id: runtime.network.device_id.clone(),
    };
    let publisher = ButtonPublisher::new(system.device_id());

    if !mqtt.publish(
        &status_topic(system.device_id()),
        b"online",
        Qos::AtLeastOnce,
        true,
    ) {
        warn!("failed to publish online status");
    }

    let monitor_for_tick = monitor.clone();
    let tick_system = system.clone();
    let tick_timer = timers.timer(move || {
        if let Ok(mut monitor) = monitor_for_tick.lock() {
            monitor.on_tick(&tick_system);
        }
    })?;
    tick_timer.every(Duration::from_millis(runtime.node.health_check_interval_ms))?;

    info!("button node started (device id `{}`)", system.device_id());

    let pressed = Arc::new(AtomicBool::new(false));
    let pressed_for_isr = pressed.clone();
    unsafe {
        button.subscribe(move || {
            pressed_for_isr.store(true, Ordering::Relaxed);
        })?;
    }
    button.enable_interrupt()?;

    let debounce = Duration::from_millis(runtime.node.button_debounce_ms as u64);
    let mut last_accepted: Option<Instant> = None;

    loop {
        if pressed.swap(false, Ordering::Relaxed) {
            let now = Instant::now();
            // The raw interrupt can bounce; one press is accepted per
            // debounce window, matching the platform's button-handler
            // contract the publisher relies on.
            if last_accepted.map_or(true, |at| now.duration_since(at) >= debounce) {
                last_accepted = Some(now);
                publisher.on_button_edge(&mut mqtt);
            }
            button.enable_interrupt()?;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

fn configure_button(pin: AnyIOPin) -> anyhow::Result<PinDriver<'static, AnyIOPin, Input>> {
    let mut button = PinDriver::input(pin).context("failed to configure button pin")?;
    button.set_pull(Pull::Up)?;
    button.set_interrupt_type(InterruptType::NegEdge)?;
    Ok(button)
}

fn connect_wifi(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs_partition: EspDefaultNvsPartition,
    network: &NetworkConfig,
) -> anyhow::Result<EspWifi<'static>> {
    let mut esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?;
    let mut wifi = BlockingWifi::wrap(&mut esp_wifi, sys_loop)?;

    let auth_method = if network.wifi_pass.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: network
            .wifi_ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi ssid too long"))?,
        password: network
            .wifi_pass
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("wifi started, connecting to `{}`", network.wifi_ssid);

    let mut last_err = None;
    for attempt in 1..=WIFI_CONNECT_ATTEMPTS {
        info!("wifi connect attempt {attempt}/{WIFI_CONNECT_ATTEMPTS}");
        match wifi.connect() {
            Ok(()) => match wifi.wait_netif_up() {
                Ok(()) => {
                    info!("wifi connected and netif up on attempt {attempt}");
                    last_err = None;
                    break;
                }
                Err(err) => {
                    warn!("wifi netif up failed on attempt {attempt}: {err:#}");
                    last_err = Some(err);
                }
            },
            Err(err) => {
                warn!("wifi connect failed on attempt {attempt}: {err:#}");
                last_err = Some(err);
            }
        }

        if attempt < WIFI_CONNECT_ATTEMPTS {
            let _ = wifi.disconnect();
            thread::sleep(Duration::from_millis(WIFI_RETRY_DELAY_MS));
        }
    }

    match last_err {
        None => Ok(esp_wifi),
        Some(err) => Err(anyhow::Error::from(err)
            .context(format!("all {WIFI_CONNECT_ATTEMPTS} wifi connect attempts failed"))),
    }
}

fn create_mqtt_client(
    network: &NetworkConfig,
) -> anyhow::Result<(
    EspMqttClient<'static>,
    esp_idf_svc::mqtt::client::EspMqttConnection,
)> {
    let url = format!("mqtt://{}:{}", network.mqtt_host, network.mqtt_port);

    let conf = MqttClientConfiguration {
        client_id: Some(network.device_id.as_str()),
        username: if network.mqtt_user.is_empty() {
            None
        } else {
            Some(network.mqtt_user.as_str())
        },
        password: if network.mqtt_pass.is_empty() {
            None
        } else {
            Some(network.mqtt_pass.as_str())
        },
        ..Default::default()
    };

    Ok(EspMqttClient::new(&url, &conf)?)
}
