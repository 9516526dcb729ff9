//! Seams between the core logic and the host platform. The firmware shims
//! implement these against tokio/rumqttc on the development host and against
//! esp-idf services on the ESP target; tests implement them with recording
//! fakes.

/// MQTT delivery intent for a single publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Timer and output primitives backing the alert indicator.
///
/// All three operations are assumed infallible: if the platform cannot
/// schedule a timer or drive the pin, that is a fatal startup condition
/// handled before the indicator exists.
pub trait IndicatorDriver {
    type Handle;

    /// Schedules a periodic task that flips the indicator output each firing.
    fn start_toggle(&mut self, period_ms: u64) -> Self::Handle;

    fn cancel_toggle(&mut self, handle: Self::Handle);

    /// Drives the output to the resting (no-alert) level, held high.
    fn set_resting_level(&mut self);
}

/// Synchronous publish seam to the broker client.
pub trait MessagingClient {
    /// Returns whether the publish attempt was accepted for delivery.
    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos, retain: bool) -> bool;
}

/// Read-only system figures reported in the diagnostic log line.
pub trait SystemInfo {
    fn uptime_seconds(&self) -> u64;
    fn heap_total_bytes(&self) -> u64;
    fn heap_free_bytes(&self) -> u64;
    fn device_id(&self) -> &str;
}
