pub use stm32h7xx_hal as hal;

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use fugit::Hertz;
use hal::adc::{Adc, AdcSampleTime, Resolution};
use hal::delay::DelayFromCountDownTimer;
use hal::independent_watchdog::IndependentWatchdog;
use hal::pac::CorePeripherals;
use hal::pac::Peripherals as DevicePeripherals;
use hal::prelude::*;
use systick_monotonic::Systick;

use noise_alarm_control::{AlertActuator, InitError, SampleAcquirer, CONFIG, SAMPLE_COUNT};

use crate::led_strip::{self, LedStrip};
use crate::microphone::{self, AdcControl, MicrophoneDma};
use crate::watchdog::SystemWatchdog;

pub type Acquirer = SampleAcquirer<AdcControl, MicrophoneDma, CycleDelay, SAMPLE_COUNT>;

pub struct System {
    pub frequency: Hertz<u32>,
    pub mono: Systick<1000>,
    pub acquirer: Acquirer,
    pub actuator: AlertActuator<LedStrip>,
    pub watchdog: SystemWatchdog,
    pub delay: CycleDelay,
}

impl System {
    /// Initialize system abstraction.
    ///
    /// The watchdog is started last, once everything else is up.
    ///
    /// # Errors
    ///
    /// Fails when the build-time configuration is inconsistent or when the
    /// sampling peripherals cannot be set up.
    ///
    /// # Panics
    ///
    /// The system can be initialized only once. It panics otherwise.
    pub fn init(mut cp: CorePeripherals, dp: DevicePeripherals) -> Result<Self, InitError> {
        CONFIG.validate()?;

        enable_cache(&mut cp);

        let board = daisy::Board::take().unwrap();
        let ccdr = daisy::board_freeze_clocks!(board, dp);
        let pins = daisy::board_split_gpios!(board, ccdr, dp);

        let system_frequency = ccdr.clocks.sys_ck();
        let mono = Systick::new(cp.SYST, system_frequency.raw());
        let delay = CycleDelay::new(system_frequency);

        let acquirer = {
            let mut timer_delay = DelayFromCountDownTimer::new(dp.TIM2.timer(
                100.Hz(),
                ccdr.peripheral.TIM2,
                &ccdr.clocks,
            ));
            let mut adc = Adc::adc1(
                dp.ADC1,
                4.MHz(),
                &mut timer_delay,
                ccdr.peripheral.ADC12,
                &ccdr.clocks,
            );
            adc.set_resolution(Resolution::TwelveBit);
            adc.set_sample_time(AdcSampleTime::T_16);

            let streams = hal::dma::dma::StreamsTuple::new(dp.DMA1, ccdr.peripheral.DMA1);
            let (control, transfer) =
                microphone::init(adc.enable(), pins.GPIO.PIN_C5.into_analog(), streams.1)?;
            SampleAcquirer::new(control, transfer, delay, CONFIG.acquisition_timeout_ms)
        };

        let actuator = led_strip::init(
            dp.SPI2,
            pins.GPIO.PIN_A9.into_alternate(),
            ccdr.peripheral.SPI2,
            &ccdr.clocks,
            &CONFIG,
        );

        let watchdog =
            SystemWatchdog::start(IndependentWatchdog::new(dp.IWDG), CONFIG.watchdog_timeout_ms);

        Ok(Self {
            frequency: system_frequency,
            mono,
            acquirer,
            actuator,
            watchdog,
            delay,
        })
    }
}

/// Busy-wait delay counting core cycles.
///
/// Unlike a timer it can be copied into every context that needs to wait.
#[derive(Debug, Clone, Copy)]
pub struct CycleDelay {
    cycles_per_us: u32,
}

impl CycleDelay {
    pub fn new(frequency: Hertz<u32>) -> Self {
        Self {
            cycles_per_us: frequency.to_MHz().max(1),
        }
    }
}

impl DelayUs<u32> for CycleDelay {
    fn delay_us(&mut self, us: u32) {
        cortex_m::asm::delay(us.saturating_mul(self.cycles_per_us));
    }
}

impl DelayMs<u32> for CycleDelay {
    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.delay_us(1000);
        }
    }
}

/// AN5212: Improve application performance when fetching instruction and
/// data, from both internal and external memories.
fn enable_cache(cp: &mut CorePeripherals) {
    cp.SCB.enable_icache();
    // NOTE: The data cache would require cache management around the
    // microphone DMA buffers. It stays disabled.
}
