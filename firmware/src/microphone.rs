//! Microphone sampling through ADC1 and DMA1.
//!
//! The HAL's ADC is handed over to the DMA transfer at init, so starting and
//! stopping the conversion afterwards goes straight to the ADC registers.
//! The DMA stream always fills the same static buffer. Completed readings are
//! copied out before the stream is restarted for the next acquisition.

use core::mem::MaybeUninit;
use core::ptr::addr_of_mut;

use noise_alarm_control::acquirer::{BulkTransfer, Sensor};
use noise_alarm_control::{InitError, SAMPLE_COUNT};

use crate::system::hal::adc::{Adc, AdcDmaMode, Enabled};
use crate::system::hal::dma::dma::{DmaConfig, Stream1};
use crate::system::hal::dma::{DBTransfer, PeripheralToMemory, Transfer};
use crate::system::hal::gpio;
use crate::system::hal::pac::{ADC1, DMA1};

/// Largest number of items a single DMA stream transfer can move.
const MAX_TRANSFER_LEN: usize = u16::MAX as usize;

/// ADC1 hands over 32-bit data register words.
type Buffer = [u32; SAMPLE_COUNT];

/// CV input 1 of the Patch SM, wired to the microphone preamp.
pub type MicPin = gpio::gpioa::PA3<gpio::Analog>;

type AdcTransfer =
    Transfer<Stream1<DMA1>, Adc<ADC1, Enabled>, PeripheralToMemory, &'static mut Buffer, DBTransfer>;

// NOTE: The data cache is never enabled, DMA writes land straight in memory.
#[link_section = ".sram"]
static mut BUFFER: MaybeUninit<Buffer> = MaybeUninit::uninit();

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum TransferError {
    /// The stream could not be restarted.
    Rejected,
}

/// Direct register access to ADC1 once it is owned by the transfer.
pub struct AdcControl {
    _pin: MicPin,
}

impl AdcControl {
    fn registers() -> &'static crate::system::hal::pac::adc1::RegisterBlock {
        // SAFETY: Only start, stop and the data register are touched here.
        // The HAL configured everything else before giving up the ADC.
        unsafe { &*ADC1::ptr() }
    }
}

impl Sensor for AdcControl {
    fn drain_pending(&mut self) {
        let adc = Self::registers();
        while adc.isr.read().eoc().bit_is_set() {
            let _ = adc.dr.read().rdata().bits();
        }
        adc.isr.write(|w| w.ovr().set_bit());
    }

    fn start(&mut self) {
        let adc = Self::registers();
        adc.cfgr.modify(|_, w| w.cont().set_bit());
        adc.cr.modify(|_, w| w.adstart().set_bit());
    }

    fn stop(&mut self) {
        let adc = Self::registers();
        if adc.cr.read().adstart().bit_is_set() {
            adc.cr.modify(|_, w| w.adstp().set_bit());
            while adc.cr.read().adstp().bit_is_set() {}
        }
    }
}

pub struct MicrophoneDma {
    transfer: AdcTransfer,
    readings: [u16; SAMPLE_COUNT],
    fault: Option<TransferError>,
}

impl BulkTransfer<SAMPLE_COUNT> for MicrophoneDma {
    type Error = TransferError;

    fn arm(&mut self) {
        self.transfer.clear_transfer_complete_interrupt();
        self.fault = restart(&mut self.transfer, |_| ()).err();
    }

    fn poll_complete(&mut self) -> nb::Result<(), TransferError> {
        if let Some(error) = self.fault {
            return Err(nb::Error::Other(error));
        }
        if !self.transfer.get_transfer_complete_flag() {
            return Err(nb::Error::WouldBlock);
        }
        self.transfer.clear_transfer_complete_interrupt();

        let readings = &mut self.readings;
        let restarted = restart(&mut self.transfer, |buffer| {
            for (reading, word) in readings.iter_mut().zip(buffer.iter()) {
                *reading = u16::try_from(*word).unwrap_or(u16::MAX);
            }
        });
        restarted.map_err(nb::Error::Other)
    }

    fn abort(&mut self) {
        self.transfer.pause(|_| ());
    }

    fn readings(&self) -> &[u16; SAMPLE_COUNT] {
        &self.readings
    }
}

/// Restart the stream from the beginning of the buffer, handing the buffer to
/// `inspect` while the stream is disabled.
fn restart<F>(transfer: &mut AdcTransfer, inspect: F) -> Result<(), TransferError>
where
    F: FnOnce(&Buffer),
{
    // SAFETY: The buffer is handed back unchanged, so the stream keeps
    // writing into valid memory of the same length.
    let restarted = unsafe {
        transfer.next_transfer_with(|buffer, _, _| {
            inspect(buffer);
            (buffer, ())
        })
    };
    restarted.map_err(|_| TransferError::Rejected)
}

/// Hand ADC1 over to DMA1 stream 1 and return both halves of the sampler.
///
/// Claims the static DMA buffer, so it must be called only once, from
/// `System::init`.
pub fn init(
    mut adc: Adc<ADC1, Enabled>,
    mut pin: MicPin,
    stream: Stream1<DMA1>,
) -> Result<(AdcControl, MicrophoneDma), InitError> {
    if SAMPLE_COUNT > MAX_TRANSFER_LEN {
        return Err(InitError::TransferUnavailable);
    }
    if AdcControl::registers().cr.read().aden().bit_is_clear() {
        return Err(InitError::SensorMisconfigured);
    }

    // SAFETY: Called once during init, before any interrupt is enabled.
    let buffer: &'static mut Buffer =
        unsafe { (*addr_of_mut!(BUFFER)).write([0; SAMPLE_COUNT]) };

    // Selects the channel and enables DMA requests from the ADC. The
    // conversion is stopped again right away, acquisitions start it on demand.
    adc.start_conversion_dma(&mut pin, AdcDmaMode::OneShot);
    let config = DmaConfig::default().memory_increment(true);
    let mut transfer: AdcTransfer = Transfer::init(stream, adc, buffer, None, config);
    transfer.start(|_| ());

    let mut control = AdcControl { _pin: pin };
    control.stop();
    control.drain_pending();

    Ok((
        control,
        MicrophoneDma {
            transfer,
            readings: [0; SAMPLE_COUNT],
            fault: None,
        },
    ))
}
