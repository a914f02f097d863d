use embedded_hal::watchdog::Watchdog;
use fugit::ExtU32;

use crate::system::hal::independent_watchdog::IndependentWatchdog;

/// The independent watchdog, started once and never stopped.
pub struct SystemWatchdog {
    iwdg: IndependentWatchdog,
}

impl SystemWatchdog {
    pub fn start(mut iwdg: IndependentWatchdog, timeout_ms: u32) -> Self {
        iwdg.start(timeout_ms.millis());
        iwdg.feed();
        Self { iwdg }
    }
}

impl Watchdog for SystemWatchdog {
    fn feed(&mut self) {
        self.iwdg.feed();
    }
}
