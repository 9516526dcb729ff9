use std::fmt;

use crate::platform::IndicatorDriver;

enum IndicatorState<H> {
    Idle,
    Running(H),
}

/// Idempotent start/stop control over the periodic alert blink.
///
/// At most one toggle task is ever scheduled; the tagged state makes a
/// second schedule unrepresentable rather than guarding it with a flag.
pub struct AlertIndicator<D: IndicatorDriver> {
    driver: D,
    blink_interval_ms: u64,
    state: IndicatorState<D::Handle>,
}

impl<D: IndicatorDriver> AlertIndicator<D> {
    pub fn new(driver: D, blink_interval_ms: u64) -> Self {
        let mut indicator = Self {
            driver,
            blink_interval_ms,
            state: IndicatorState::Idle,
        };
        // Output must be at a defined level before the first health evaluation.
        indicator.driver.set_resting_level();
        indicator
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, IndicatorState::Running(_))
    }

    /// Schedules the periodic toggle task. No-op when one is already running.
    pub fn start(&mut self) {
        if let IndicatorState::Idle = self.state {
            let handle = self.driver.start_toggle(self.blink_interval_ms);
            self.state = IndicatorState::Running(handle);
        }
    }

    /// Cancels the toggle task if one is running; in every case the output is
    /// parked at the resting level, never left mid-toggle.
    pub fn stop(&mut self) {
        if let IndicatorState::Running(handle) =
            std::mem::replace(&mut self.state, IndicatorState::Idle)
        {
            self.driver.cancel_toggle(handle);
        }
        self.driver.set_resting_level();
    }

    #[cfg(test)]
    pub(crate) fn driver(&self) -> &D {
        &self.driver
    }
}

// Hand-written: timer handles have no Debug guarantee.
impl<D: IndicatorDriver> fmt::Debug for AlertIndicator<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertIndicator")
            .field("blink_interval_ms", &self.blink_interval_ms)
            .field("active", &self.is_active())
            .finish()
    }
}
