//! PCF8575 16-bit I²C port expander carrying the transmitter buttons.
//!
//! Quasi-bidirectional pins: writing `1` releases a pin to its weak
//! pull-up so it can be read as an input. A port reads `P0..P7` first,
//! then `P10..P17`.

use crate::config::PCF8575_I2C_ADDRESS;
use embedded_hal::i2c::I2c;

pub struct Pcf8575<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Pcf8575<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            address: PCF8575_I2C_ADDRESS,
        }
    }

    /// Set every pin to input. Fails when nothing answers at the address,
    /// which is how a board without buttons (the receiver) is detected.
    pub fn probe(&mut self) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, &[0xFF, 0xFF])
    }

    /// Current pin levels, bit `n` = pin `n`.
    pub fn read(&mut self) -> Result<u16, I2C::Error> {
        let mut port = [0u8; 2];
        self.i2c.read(self.address, &mut port)?;
        Ok(u16::from_le_bytes(port))
    }
}
