//! SSD1306 OLED display wrapper.

use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::{MonoTextStyle, MonoTextStyleBuilder};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::I2CDisplayInterface;
use ssd1306::Ssd1306;

use crate::lifecycle::Display;
use crate::ui::screens::{centered_origin, split_lines, InfoScreen, LINE_HEIGHT};

/// Concrete driver type, generic over the I²C bus handle.
pub type Driver<I2C> =
    Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

/// The node's 128×64 OLED.
///
/// The panel is initialised on the first draw, after the lifecycle has
/// powered the rail. Draw errors are logged and otherwise ignored: a missing
/// display must not stop a report.
pub struct Oled<I2C> {
    driver: Driver<I2C>,
    initialized: bool,
    ready: bool,
}

impl<I2C> Oled<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    pub fn new(i2c: I2C) -> Self {
        let interface = I2CDisplayInterface::new(i2c);
        let driver = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        Self {
            driver,
            initialized: false,
            ready: false,
        }
    }

    /// Send the init sequence once; a failed init is not retried.
    fn ensure_init(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        self.ready = match self.driver.init() {
            Ok(()) => true,
            Err(e) => {
                warn!("oled init failed: {:?}", defmt::Debug2Format(&e));
                false
            }
        };
    }

    fn flush(&mut self) {
        if !self.ready {
            return;
        }
        if let Err(e) = self.driver.flush() {
            warn!("oled flush failed: {:?}", defmt::Debug2Format(&e));
        }
    }
}

fn text_style() -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyleBuilder::new()
        .font(&FONT_6X10)
        .text_color(BinaryColor::On)
        .build()
}

impl<I2C> Display for Oled<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    fn show_text(&mut self, text: &str) {
        self.ensure_init();
        self.driver.clear_buffer();

        let lines = split_lines(text);
        for (index, line) in lines.iter().enumerate() {
            let (x, y) = centered_origin(line, index, lines.len());
            let _ = Text::with_baseline(line, Point::new(x, y), text_style(), Baseline::Top)
                .draw(&mut self.driver);
        }

        self.flush();
    }

    fn show_info(&mut self, info: &InfoScreen<'_>) {
        self.ensure_init();
        self.driver.clear_buffer();

        for (row, line) in info.lines().iter().enumerate() {
            let y = row as i32 * (LINE_HEIGHT + 2);
            let _ = Text::with_baseline(line, Point::new(0, y), text_style(), Baseline::Top)
                .draw(&mut self.driver);
        }

        self.flush();
    }
}
