//! Aggregated keyboard state as a boot-protocol report.
//!
//! `[modifiers, 0, k0, k1, k2, k3, k4, k5]`. Modifier bits run left
//! Ctrl/Shift/Alt/GUI then the right-hand set. A key slot holds a usage
//! code or 0; a seventh simultaneous key is dropped, not reported.

/// Keyboard report size in bytes.
pub const KEYBOARD_REPORT_SIZE: usize = 8;

/// Number of simultaneous non-modifier keys (rollover slots).
pub const ROLLOVER_SLOTS: usize = 6;

/// Modifier bits.
pub const MOD_LEFT_CTRL: u8 = 0x01;
pub const MOD_LEFT_SHIFT: u8 = 0x02;
pub const MOD_LEFT_ALT: u8 = 0x04;
pub const MOD_LEFT_GUI: u8 = 0x08;

/// Key usage codes used by the stock binding table.
pub mod keys {
    pub const A: u8 = 0x04;
    pub const D: u8 = 0x07;
    pub const I: u8 = 0x0C;
    pub const J: u8 = 0x0D;
    pub const K: u8 = 0x0E;
    pub const L: u8 = 0x0F;
    pub const S: u8 = 0x16;
    pub const W: u8 = 0x1A;
    pub const NUM_1: u8 = 0x1E;
    pub const NUM_2: u8 = 0x1F;
    pub const NUM_3: u8 = 0x20;
    pub const NUM_4: u8 = 0x21;
    pub const NUM_5: u8 = 0x22;
    pub const NUM_6: u8 = 0x23;
    pub const NUM_7: u8 = 0x24;
    pub const NUM_8: u8 = 0x25;
    pub const NUM_9: u8 = 0x26;
}

/// Six-key rollover report.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardReport {
    pub modifier: u8,
    pub reserved: u8,
    pub keycodes: [u8; ROLLOVER_SLOTS],
}

impl KeyboardReport {
    pub const fn empty() -> Self {
        Self {
            modifier: 0,
            reserved: 0,
            keycodes: [0; ROLLOVER_SLOTS],
        }
    }

    /// `true` if `keycode` occupies a slot.
    pub fn contains(&self, keycode: u8) -> bool {
        keycode != 0 && self.keycodes.contains(&keycode)
    }

    /// Put `keycode` into the first free slot.
    ///
    /// Returns `false` when all six slots are taken (the key is dropped).
    /// Inserting a key that is already present succeeds without change.
    pub fn insert(&mut self, keycode: u8) -> bool {
        if keycode == 0 || self.contains(keycode) {
            return true;
        }
        match self.keycodes.iter_mut().find(|k| **k == 0) {
            Some(slot) => {
                *slot = keycode;
                true
            }
            None => false,
        }
    }

    /// Clear the slot holding `keycode`. Returns `true` if one was cleared.
    pub fn remove(&mut self, keycode: u8) -> bool {
        if keycode == 0 {
            return false;
        }
        match self.keycodes.iter_mut().find(|k| **k == keycode) {
            Some(slot) => {
                *slot = 0;
                true
            }
            None => false,
        }
    }

    /// Copy of this report with `keycode` released.
    pub fn without(&self, keycode: u8) -> Self {
        let mut copy = *self;
        copy.remove(keycode);
        copy
    }

    /// Write the 8 report bytes. Returns 0 if `buf` is too short.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < KEYBOARD_REPORT_SIZE {
            return 0;
        }
        buf[0] = self.modifier;
        buf[1] = self.reserved;
        buf[2..8].copy_from_slice(&self.keycodes);
        KEYBOARD_REPORT_SIZE
    }

    /// Nothing held, modifiers included.
    pub fn is_empty(&self) -> bool {
        self.modifier == 0 && self.keycodes.iter().all(|&k| k == 0)
    }
}

/// Boot keyboard: modifier byte, reserved byte, five LED outputs and six
/// key slots.
#[rustfmt::skip]
pub const KEYBOARD_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, 0x09, 0x06, 0xA1, 0x01,
    // modifiers E0..E7, one bit each
    0x05, 0x07, 0x19, 0xE0, 0x29, 0xE7, 0x15, 0x00, 0x25, 0x01, 0x75, 0x01, 0x95, 0x08, 0x81, 0x02,
    // reserved
    0x95, 0x01, 0x75, 0x08, 0x81, 0x01,
    // LEDs, padded to a byte
    0x05, 0x08, 0x19, 0x01, 0x29, 0x05, 0x95, 0x05, 0x75, 0x01, 0x91, 0x02,
    0x95, 0x01, 0x75, 0x03, 0x91, 0x01,
    // key array
    0x05, 0x07, 0x19, 0x00, 0x29, 0xFF, 0x15, 0x00, 0x26, 0xFF, 0x00, 0x95, 0x06, 0x75, 0x08, 0x81, 0x00,
    0xC0,
];
