//! USB HID gamepad report - a plain 32-button bitmask.
//!
//! Layout (4 bytes, little-endian):
//! ```text
//! Byte 0-3: Button bitfield, bit n = button n+1
//! ```
//!
//! The stock layout puts the face buttons on bits 0-3 and the D-pad on
//! bits 4-7 (see [`buttons`]); hosts see them as buttons 1-8.

/// Gamepad report size in bytes.
pub const GAMEPAD_REPORT_SIZE: usize = 4;

/// Number of buttons the report carries.
pub const GAMEPAD_BUTTON_COUNT: u8 = 32;

/// Button indices used by the stock binding table.
pub mod buttons {
    pub const A: u8 = 0;
    pub const B: u8 = 1;
    pub const X: u8 = 2;
    pub const Y: u8 = 3;
    pub const DPAD_LEFT: u8 = 4;
    pub const DPAD_UP: u8 = 5;
    pub const DPAD_RIGHT: u8 = 6;
    pub const DPAD_DOWN: u8 = 7;
}

/// 32-button gamepad report.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GamepadReport {
    /// Button bitfield.
    pub buttons: u32,
}

impl GamepadReport {
    /// No buttons pressed.
    pub const fn empty() -> Self {
        Self { buttons: 0 }
    }

    /// Serialise into a byte slice for USB HID transmission.
    /// Returns the number of bytes written (always 4).
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < GAMEPAD_REPORT_SIZE {
            return 0;
        }
        buf[..GAMEPAD_REPORT_SIZE].copy_from_slice(&self.buttons.to_le_bytes());
        GAMEPAD_REPORT_SIZE
    }

    /// `true` if button `index` is held.
    pub fn is_pressed(&self, index: u8) -> bool {
        index < GAMEPAD_BUTTON_COUNT && self.buttons & (1 << index) != 0
    }
}

/// USB HID Report Descriptor for a 32-button gamepad.
pub const GAMEPAD_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x05, // Usage (Game Pad)
    0xA1, 0x01, // Collection (Application)
    0x05, 0x09, //   Usage Page (Buttons)
    0x19, 0x01, //   Usage Minimum (Button 1)
    0x29, 0x20, //   Usage Maximum (Button 32)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x20, //   Report Count (32)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0xC0, // End Collection
];
