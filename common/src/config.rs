use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub health_check_interval_ms: u64,
    pub blink_interval_ms: u64,
    pub button_debounce_ms: u32,
    pub led_pin: i32,
    pub button_pin: i32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            health_check_interval_ms: 1_000,
            blink_interval_ms: 300,
            button_debounce_ms: 200,
            led_pin: 2,
            button_pin: 0,
        }
    }
}

impl NodeConfig {
    pub fn sanitize(&mut self) {
        self.health_check_interval_ms = self.health_check_interval_ms.clamp(100, 60_000);
        self.blink_interval_ms = self.blink_interval_ms.clamp(50, 5_000);
        self.button_debounce_ms = self.button_debounce_ms.clamp(10, 1_000);

        if self.led_pin < 0 {
            self.led_pin = 2;
        }
        if self.button_pin < 0 {
            self.button_pin = 0;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub device_id: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_pass: String::new(),
            mqtt_host: "192.168.1.100".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            device_id: "button-node".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub node: NodeConfig,
    pub network: NetworkConfig,
}
