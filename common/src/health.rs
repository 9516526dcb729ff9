use std::fmt;

use log::info;

use crate::{
    indicator::AlertIndicator,
    platform::{IndicatorDriver, SystemInfo},
    uptime::format_uptime,
};

/// Latest connectivity figures as reported by the platform notifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectivityState {
    pub link_up: bool,
    pub session_up: bool,
}

impl ConnectivityState {
    pub fn healthy(self) -> bool {
        self.link_up && self.session_up
    }
}

/// One tick's worth of vital signs; reported, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub uptime: String,
    pub wifi_ok: bool,
    pub mqtt_ok: bool,
    pub heap_total: u64,
    pub heap_free: u64,
}

/// Fuses the link and broker-session signals into the alert indicator and
/// reports a diagnostic line on every periodic tick.
///
/// All entry points run to completion on the single event loop, so the
/// connectivity state needs no locking and is never stale beyond one tick.
pub struct HealthMonitor<D: IndicatorDriver> {
    connectivity: ConnectivityState,
    indicator: AlertIndicator<D>,
}

impl<D: IndicatorDriver> HealthMonitor<D> {
    pub fn new(indicator: AlertIndicator<D>) -> Self {
        Self {
            connectivity: ConnectivityState::default(),
            indicator,
        }
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.connectivity
    }

    pub fn indicator(&self) -> &AlertIndicator<D> {
        &self.indicator
    }

    pub fn on_link_changed(&mut self, up: bool) {
        self.connectivity.link_up = up;
        self.apply();
    }

    pub fn on_session_changed(&mut self, up: bool) {
        self.connectivity.session_up = up;
        self.apply();
    }

    /// Periodic health check: emits one diagnostic line, then re-evaluates
    /// the indicator. Missed ticks are not queued or caught up.
    pub fn on_tick(&mut self, system: &impl SystemInfo) {
        let snapshot = self.snapshot(system);
        info!(
            "Uptime: {} | Wi-Fi: {} | MQTT: {} | RAM: {}, {} free",
            snapshot.uptime,
            if snapshot.wifi_ok { "Yes" } else { "No" },
            if snapshot.mqtt_ok { "Yes" } else { "No" },
            snapshot.heap_total,
            snapshot.heap_free,
        );
        self.apply();
    }

    pub fn snapshot(&self, system: &impl SystemInfo) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            uptime: format_uptime(system.uptime_seconds()),
            wifi_ok: self.connectivity.link_up,
            mqtt_ok: self.connectivity.session_up,
            heap_total: system.heap_total_bytes(),
            heap_free: system.heap_free_bytes(),
        }
    }

    // State mutation always precedes this call, so the indicator is never
    // evaluated against a stale reading. Redundant start/stop calls are
    // absorbed by the indicator itself.
    fn apply(&mut self) {
        if self.connectivity.healthy() {
            self.indicator.stop();
        } else {
            self.indicator.start();
        }
    }
}

impl<D: IndicatorDriver> fmt::Debug for HealthMonitor<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("connectivity", &self.connectivity)
            .field("indicator", &self.indicator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default)]
    struct RecordingDriver {
        next_handle: u32,
        schedules: u32,
        cancels: u32,
    }

    impl IndicatorDriver for RecordingDriver {
        type Handle = u32;

        fn start_toggle(&mut self, _period_ms: u64) -> u32 {
            self.next_handle += 1;
            self.schedules += 1;
            self.next_handle
        }

        fn cancel_toggle(&mut self, _handle: u32) {
            self.cancels += 1;
        }

        fn set_resting_level(&mut self) {}
    }

    #[derive(Debug)]
    struct FixedSystemInfo;

    impl SystemInfo for FixedSystemInfo {
        fn uptime_seconds(&self) -> u64 {
            90_061
        }

        fn heap_total_bytes(&self) -> u64 {
            327_680
        }

        fn heap_free_bytes(&self) -> u64 {
            221_184
        }

        fn device_id(&self) -> &str {
            "test-node"
        }
    }

    fn monitor() -> HealthMonitor<RecordingDriver> {
        HealthMonitor::new(AlertIndicator::new(RecordingDriver::default(), 300))
    }

    #[test]
    fn starts_unhealthy_until_both_signals_are_up() {
        let mut monitor = monitor();

        monitor.on_tick(&FixedSystemInfo);
        assert!(monitor.indicator().is_active());

        monitor.on_link_changed(true);
        assert!(monitor.indicator().is_active());

        monitor.on_session_changed(true);
        assert!(!monitor.indicator().is_active());
    }

    #[test]
    fn either_signal_dropping_activates_the_indicator() {
        let mut monitor = monitor();
        monitor.on_link_changed(true);
        monitor.on_session_changed(true);
        assert!(!monitor.indicator().is_active());

        monitor.on_link_changed(false);
        assert!(monitor.indicator().is_active());

        monitor.on_link_changed(true);
        assert!(!monitor.indicator().is_active());

        monitor.on_session_changed(false);
        assert!(monitor.indicator().is_active());

        monitor.on_session_changed(true);
        assert!(!monitor.indicator().is_active());

        // Every activation above was paired with a cancel on recovery.
        assert_eq!(monitor.indicator().driver().schedules, 3);
        assert_eq!(monitor.indicator().driver().cancels, 3);
    }

    #[test]
    fn indicator_tracks_latest_values_over_arbitrary_sequences() {
        let mut monitor = monitor();
        let transitions = [
            ("link", false),
            ("session", true),
            ("link", true),
            ("link", true),
            ("session", false),
            ("session", false),
            ("session", true),
        ];

        for (signal, up) in transitions {
            match signal {
                "link" => monitor.on_link_changed(up),
                _ => monitor.on_session_changed(up),
            }
            let state = monitor.connectivity();
            assert_eq!(monitor.indicator().is_active(), !state.healthy());
        }
    }

    #[test]
    fn repeated_notifications_schedule_no_extra_tasks() {
        let mut monitor = monitor();

        monitor.on_session_changed(false);
        monitor.on_session_changed(false);
        monitor.on_tick(&FixedSystemInfo);
        monitor.on_tick(&FixedSystemInfo);

        assert_eq!(monitor.indicator().driver().schedules, 1);
    }

    #[test]
    fn debug_output_needs_no_debug_bound_on_timer_handles() {
        struct OpaqueHandle;

        struct OpaqueDriver;

        impl IndicatorDriver for OpaqueDriver {
            type Handle = OpaqueHandle;

            fn start_toggle(&mut self, _period_ms: u64) -> OpaqueHandle {
                OpaqueHandle
            }

            fn cancel_toggle(&mut self, _handle: OpaqueHandle) {}

            fn set_resting_level(&mut self) {}
        }

        let mut monitor = HealthMonitor::new(AlertIndicator::new(OpaqueDriver, 300));
        monitor.on_session_changed(false);

        let rendered = format!("{monitor:?}");
        assert!(rendered.contains("HealthMonitor"));
        assert!(rendered.contains("active: true"));
    }

    #[test]
    fn snapshot_reflects_system_figures_and_connectivity() {
        let mut monitor = monitor();
        monitor.on_link_changed(true);

        let snapshot = monitor.snapshot(&FixedSystemInfo);

        assert_eq!(
            snapshot,
            DiagnosticsSnapshot {
                uptime: "1 days, 01:01:01".to_string(),
                wifi_ok: true,
                mqtt_ok: false,
                heap_total: 327_680,
                heap_free: 221_184,
            }
        );
    }
}
