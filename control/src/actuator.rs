//! Uniform rendering of the alarm state on an addressable LED strip.

use core::iter;

use embedded_hal::blocking::delay::DelayMs;
use smart_leds::{SmartLedsWrite, RGB8};

use crate::detector::DetectionState;

const OFF: RGB8 = RGB8 { r: 0, g: 0, b: 0 };

pub struct AlertActuator<W> {
    strip: W,
    led_count: usize,
    alert_color: RGB8,
}

impl<W> AlertActuator<W>
where
    W: SmartLedsWrite<Color = RGB8>,
{
    pub fn new(strip: W, led_count: usize, alert_color: RGB8) -> Self {
        Self {
            strip,
            led_count,
            alert_color,
        }
    }

    /// Paint every LED with the color of the given state.
    pub fn render(&mut self, state: DetectionState) -> Result<(), W::Error> {
        match state {
            DetectionState::Alert => self.fill(self.alert_color),
            DetectionState::Quiet => self.fill(OFF),
        }
    }

    pub fn clear(&mut self) -> Result<(), W::Error> {
        self.fill(OFF)
    }

    /// Light the strip for `duration_ms`, then clear it.
    ///
    /// The wait is split into slices of at most `slice_ms` and `between_slices`
    /// runs after each of them, so the caller can keep feeding the watchdog
    /// while this blocks.
    pub fn pulse<D, F>(
        &mut self,
        duration_ms: u32,
        slice_ms: u32,
        delay: &mut D,
        mut between_slices: F,
    ) -> Result<(), W::Error>
    where
        D: DelayMs<u32>,
        F: FnMut(),
    {
        self.render(DetectionState::Alert)?;

        let slice_ms = slice_ms.max(1);
        let mut remaining_ms = duration_ms;
        while remaining_ms > 0 {
            let step = remaining_ms.min(slice_ms);
            delay.delay_ms(step);
            remaining_ms -= step;
            between_slices();
        }

        self.clear()
    }

    fn fill(&mut self, color: RGB8) -> Result<(), W::Error> {
        self.strip.write(iter::repeat(color).take(self.led_count))
    }
}
