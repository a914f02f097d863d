//! WS2812 strip driven by the MOSI line of SPI2.

use noise_alarm_control::{AlertActuator, Config};
use smart_leds::{SmartLedsWrite, RGB8};
use ws2812_spi::Ws2812;

use crate::system::hal;
use hal::gpio;
use hal::pac::SPI2;
use hal::prelude::*;
use hal::rcc::{rec, CoreClocks};
use hal::spi::{Enabled, NoMiso, NoSck, Spi};

/// Pin A9 of the Patch SM.
pub type DataPin = gpio::gpiob::PB15<gpio::Alternate<5>>;

type Driver = Ws2812<Spi<SPI2, Enabled, u8>>;

/// Within the 2 to 3.8 MHz window the strip encoder supports.
const SPI_FREQUENCY_MHZ: u32 = 3;

/// The strip latches whatever it received once the data line idles for
/// about 50 us. Frames are therefore pushed with interrupts disabled, so the
/// sense task cannot split one in two. A 25 LED frame takes under 1 ms.
pub struct LedStrip {
    driver: Driver,
}

impl SmartLedsWrite for LedStrip {
    type Error = <Driver as SmartLedsWrite>::Error;
    type Color = RGB8;

    fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<RGB8>,
    {
        let driver = &mut self.driver;
        cortex_m::interrupt::free(|_| driver.write(iterator))
    }
}

pub fn init(
    spi: SPI2,
    data_pin: DataPin,
    prec: rec::Spi2,
    clocks: &CoreClocks,
    config: &Config,
) -> AlertActuator<LedStrip> {
    let spi = spi.spi(
        (NoSck, NoMiso, data_pin),
        ws2812_spi::MODE,
        SPI_FREQUENCY_MHZ.MHz(),
        prec,
        clocks,
    );
    let strip = LedStrip {
        driver: Ws2812::new(spi),
    };
    AlertActuator::new(strip, config.led_count, config.alert_color)
}
