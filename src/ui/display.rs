//! SSD1306 128×32 OLED display wrapper.
//!
//! Three text rows at the 6×10 font. Drawing errors are ignored; the next
//! refresh redraws everything anyway.

use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::{MonoTextStyle, MonoTextStyleBuilder};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::I2CDisplayInterface;
use ssd1306::Ssd1306;

use crate::config::OLED_I2C_ADDRESS;

/// Concrete display driver, generic over the I²C bus handle.
pub type Display<I2C> =
    Ssd1306<I2CInterface<I2C>, DisplaySize128x32, BufferedGraphicsMode<DisplaySize128x32>>;

const ROW_Y: [i32; 3] = [0, 11, 22];

/// Initialise the SSD1306 and clear the screen.
pub fn init<I2C>(i2c: I2C) -> Display<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    let interface = I2CDisplayInterface::new_custom_address(i2c, OLED_I2C_ADDRESS);
    let mut display = Ssd1306::new(interface, DisplaySize128x32, DisplayRotation::Rotate0)
        .into_buffered_graphics_mode();
    if display.init().is_err() {
        defmt::warn!("OLED init failed");
    }
    display.clear_buffer();
    let _ = display.flush();
    display
}

fn text_style() -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyleBuilder::new()
        .font(&FONT_6X10)
        .text_color(BinaryColor::On)
        .build()
}

/// Replace the screen with up to three rows of text.
pub fn draw_rows<I2C>(display: &mut Display<I2C>, rows: &[&str])
where
    I2C: embedded_hal::i2c::I2c,
{
    display.clear_buffer();
    for (text, y) in rows.iter().zip(ROW_Y) {
        let _ = Text::with_baseline(text, Point::new(0, y), text_style(), Baseline::Top).draw(display);
    }
    let _ = display.flush();
}

/// Long press preview of the next address.
pub fn draw_preview<I2C>(display: &mut Display<I2C>, target: u8)
where
    I2C: embedded_hal::i2c::I2c,
{
    let mut next: heapless::String<12> = heapless::String::new();
    let _ = core::fmt::write(&mut next, format_args!("Next: TX{}", target));
    draw_rows(display, &[next.as_str(), "", "Release to save"]);
}

/// Transient message, centred on the middle row.
pub fn draw_message<I2C>(display: &mut Display<I2C>, message: &str)
where
    I2C: embedded_hal::i2c::I2c,
{
    draw_rows(display, &["", message]);
}
