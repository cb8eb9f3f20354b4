//! Aggregated mouse state: `[buttons, dx, dy, wheel]`.
//!
//! Movement is relative. Deltas gathered during one tick are summed by the
//! engine and clamped to a signed byte when the report is built.

/// Mouse report size in bytes.
pub const MOUSE_REPORT_SIZE: usize = 4;

/// Bit positions in the button byte.
pub const BUTTON_LEFT: u8 = 0;
pub const BUTTON_RIGHT: u8 = 1;
pub const BUTTON_MIDDLE: u8 = 2;

/// Largest magnitude a relative axis byte carries.
pub const AXIS_LIMIT: i16 = 127;

/// Relative axes of the mouse report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    X,
    Y,
    Wheel,
}

/// Clamp an accumulated displacement into the report's signed byte range.
pub fn clamp_axis(value: i16) -> i16 {
    value.clamp(-AXIS_LIMIT, AXIS_LIMIT)
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MouseReport {
    /// Bit `n` set = button `n` held.
    pub buttons: u8,
    pub x: i8,
    pub y: i8,
    pub wheel: i8,
}

impl MouseReport {
    pub const fn empty() -> Self {
        Self {
            buttons: 0,
            x: 0,
            y: 0,
            wheel: 0,
        }
    }

    /// Report for a button mask and the summed deltas of one tick.
    pub fn from_motion(buttons: u8, dx: i16, dy: i16, wheel: i16) -> Self {
        Self {
            buttons,
            x: clamp_axis(dx) as i8,
            y: clamp_axis(dy) as i8,
            wheel: clamp_axis(wheel) as i8,
        }
    }

    /// Write the 4 report bytes. Returns 0 if `buf` is too short.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < MOUSE_REPORT_SIZE {
            return 0;
        }
        buf[0] = self.buttons;
        buf[1] = self.x as u8;
        buf[2] = self.y as u8;
        buf[3] = self.wheel as u8;
        MOUSE_REPORT_SIZE
    }

    pub fn is_idle(&self) -> bool {
        self.buttons == 0 && self.x == 0 && self.y == 0 && self.wheel == 0
    }
}

/// Three buttons, relative X/Y and wheel.
#[rustfmt::skip]
pub const MOUSE_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, 0x09, 0x02, 0xA1, 0x01, 0x09, 0x01, 0xA1, 0x00,
    // buttons 1..3, padded to a byte
    0x05, 0x09, 0x19, 0x01, 0x29, 0x03, 0x15, 0x00, 0x25, 0x01, 0x95, 0x03, 0x75, 0x01, 0x81, 0x02,
    0x95, 0x01, 0x75, 0x05, 0x81, 0x01,
    // X, Y
    0x05, 0x01, 0x09, 0x30, 0x09, 0x31, 0x15, 0x81, 0x25, 0x7F, 0x75, 0x08, 0x95, 0x02, 0x81, 0x06,
    // wheel
    0x09, 0x38, 0x15, 0x81, 0x25, 0x7F, 0x75, 0x08, 0x95, 0x01, 0x81, 0x06,
    0xC0, 0xC0,
];
