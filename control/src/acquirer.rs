//! Batch acquisition of raw microphone readings.
//!
//! The sensing peripheral (ADC) and the bulk transfer engine (DMA) are
//! external. This module only owns the sequencing: flush stale readings,
//! arm the transfer, run the conversion, wait for completion, stop.

use embedded_hal::blocking::delay::DelayUs;

use crate::error::CycleFault;

/// Pause between two completion polls of the bulk transfer.
pub const POLL_INTERVAL_US: u32 = 10;

/// Fixed-length batch of raw readings from a single acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame<const N: usize> {
    samples: [u16; N],
}

impl<const N: usize> AudioFrame<N> {
    const NOT_EMPTY: () = assert!(N > 0, "audio frame must hold at least one sample");

    pub fn new(samples: [u16; N]) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NOT_EMPTY;
        Self { samples }
    }

    pub fn samples(&self) -> &[u16; N] {
        &self.samples
    }

    /// The most recently converted reading.
    pub fn latest(&self) -> u16 {
        self.samples[N - 1]
    }
}

/// Analog-to-digital converter feeding the bulk transfer.
pub trait Sensor {
    /// Discard readings queued by a previous conversion.
    fn drain_pending(&mut self);
    fn start(&mut self);
    fn stop(&mut self);
}

/// Peripheral-driven copy of `N` readings into a buffer owned by the engine.
pub trait BulkTransfer<const N: usize> {
    type Error;

    /// Prepare the engine to receive exactly `N` readings from the sensor.
    fn arm(&mut self);

    fn poll_complete(&mut self) -> nb::Result<(), Self::Error>;

    /// Cancel a transfer that is still in flight.
    fn abort(&mut self);

    /// Readings of the last completed transfer.
    fn readings(&self) -> &[u16; N];
}

pub struct SampleAcquirer<S, T, D, const N: usize> {
    sensor: S,
    transfer: T,
    delay: D,
    timeout_ms: u32,
}

impl<S, T, D, const N: usize> SampleAcquirer<S, T, D, N>
where
    S: Sensor,
    T: BulkTransfer<N>,
    D: DelayUs<u32>,
{
    pub fn new(sensor: S, transfer: T, delay: D, timeout_ms: u32) -> Self {
        Self {
            sensor,
            transfer,
            delay,
            timeout_ms,
        }
    }

    /// Capture a fresh frame, blocking until the transfer completes.
    ///
    /// # Errors
    ///
    /// Fails when the transfer reports an error or does not complete within
    /// the timeout. The sensor is stopped in both cases.
    pub fn acquire(&mut self) -> Result<AudioFrame<N>, CycleFault> {
        self.sensor.stop();
        self.sensor.drain_pending();

        self.transfer.arm();
        self.sensor.start();
        let completion = self.wait_for_completion();
        self.sensor.stop();
        completion?;

        Ok(AudioFrame::new(*self.transfer.readings()))
    }

    fn wait_for_completion(&mut self) -> Result<(), CycleFault> {
        let polls = self.timeout_ms.saturating_mul(1000) / POLL_INTERVAL_US;
        for _ in 0..=polls {
            match self.transfer.poll_complete() {
                Ok(()) => return Ok(()),
                Err(nb::Error::WouldBlock) => self.delay.delay_us(POLL_INTERVAL_US),
                Err(nb::Error::Other(_)) => {
                    self.transfer.abort();
                    return Err(CycleFault::TransferFailed);
                }
            }
        }

        self.transfer.abort();
        Err(CycleFault::TransferTimeout {
            timeout_ms: self.timeout_ms,
        })
    }
}
