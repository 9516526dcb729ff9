use log::info;

use crate::{
    platform::{MessagingClient, Qos},
    topics::button_event_topic,
};

/// Publishes one event message per debounced button edge.
///
/// The platform applies hardware debouncing and pull configuration before
/// dispatching the edge, so each call here maps to exactly one publish
/// attempt. There is no retry and no backlog: a failed attempt is logged and
/// dropped, and the next press is an independent attempt.
#[derive(Debug)]
pub struct ButtonPublisher {
    device_id: String,
    topic: String,
}

impl ButtonPublisher {
    pub fn new(device_id: impl Into<String>) -> Self {
        let device_id = device_id.into();
        let topic = button_event_topic(&device_id);
        Self { device_id, topic }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn on_button_edge(&self, mqtt: &mut impl MessagingClient) {
        let payload = serde_json::json!({ "event": "button_press" }).to_string();
        let delivered = mqtt.publish(&self.topic, payload.as_bytes(), Qos::AtLeastOnce, false);

        info!(
            "Button pressed - Published: {}",
            if delivered { "yes" } else { "no" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct ScriptedMqtt {
        outcomes: Vec<bool>,
        calls: Vec<(String, Vec<u8>, Qos, bool)>,
    }

    impl ScriptedMqtt {
        fn new(outcomes: impl IntoIterator<Item = bool>) -> Self {
            let mut outcomes: Vec<bool> = outcomes.into_iter().collect();
            outcomes.reverse();
            Self {
                outcomes,
                calls: Vec::new(),
            }
        }
    }

    impl MessagingClient for ScriptedMqtt {
        fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos, retain: bool) -> bool {
            self.calls
                .push((topic.to_string(), payload.to_vec(), qos, retain));
            self.outcomes.pop().unwrap_or(true)
        }
    }

    #[test]
    fn press_publishes_fixed_event_to_derived_topic() {
        let publisher = ButtonPublisher::new("esp32-livingroom");
        let mut mqtt = ScriptedMqtt::new([true]);

        publisher.on_button_edge(&mut mqtt);

        let (topic, payload, qos, retain) = mqtt.calls.remove(0);
        assert_eq!(topic, "devices/esp32-livingroom/events/toggl-button");
        assert_eq!(payload, br#"{"event":"button_press"}"#.to_vec());
        assert_eq!(qos, Qos::AtLeastOnce);
        assert!(!retain);
    }

    #[test]
    fn failed_delivery_does_not_change_later_attempts() {
        let publisher = ButtonPublisher::new("node-1");
        let mut mqtt = ScriptedMqtt::new([true, false, true, false, true]);

        for _ in 0..5 {
            publisher.on_button_edge(&mut mqtt);
        }

        // One attempt per press, no retries, no cross-press state.
        assert_eq!(mqtt.calls.len(), 5);
        for (topic, payload, qos, retain) in &mqtt.calls {
            assert_eq!(topic, "devices/node-1/events/toggl-button");
            assert!(!payload.is_empty());
            assert_eq!(*qos, Qos::AtLeastOnce);
            assert!(!retain);
        }
    }
}
