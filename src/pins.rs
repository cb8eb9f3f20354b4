//! Button pin snapshots and their transitions.
//!
//! Pins are active-low: a bit at [`PRESSED_LEVEL`] means the button is
//! held. Snapshots start as all-released (`0xFFFF`).

use core::fmt;

use crate::config::{BUTTON_COUNT, PRESSED_LEVEL};

/// Snapshot with every button released.
pub const ALL_RELEASED: u16 = if PRESSED_LEVEL { 0x0000 } else { 0xFFFF };

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    Pressed(u8),
    Released(u8),
}

/// Changed pins between two snapshots, lowest pin first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinDelta {
    previous: u16,
    current: u16,
}

impl PinDelta {
    pub fn new(previous: u16, current: u16) -> Self {
        Self { previous, current }
    }

    pub fn is_empty(&self) -> bool {
        self.previous == self.current
    }

    pub fn transitions(&self) -> impl Iterator<Item = Transition> {
        let changed = self.previous ^ self.current;
        let current = self.current;
        (0..BUTTON_COUNT as u8)
            .filter(move |pin| changed & (1 << pin) != 0)
            .map(move |pin| {
                let level = current & (1 << pin) != 0;
                if level == PRESSED_LEVEL {
                    Transition::Pressed(pin)
                } else {
                    Transition::Released(pin)
                }
            })
    }
}

/// `P3V P4^` style summary: `V` pressed, `^` released.
impl fmt::Display for PinDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for t in self.transitions() {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            match t {
                Transition::Pressed(pin) => write!(f, "P{}V", pin)?,
                Transition::Released(pin) => write!(f, "P{}^", pin)?,
            }
        }
        Ok(())
    }
}

/// Last snapshot of one pin source, with an optional inversion mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PinTracker {
    pins: u16,
    invert_mask: u16,
}

impl Default for PinTracker {
    fn default() -> Self {
        Self::new(0)
    }
}

impl PinTracker {
    pub const fn new(invert_mask: u16) -> Self {
        Self {
            pins: ALL_RELEASED,
            invert_mask,
        }
    }

    /// Snapshot after inversion.
    pub fn pins(&self) -> u16 {
        self.pins
    }

    /// Take a raw reading; returns what changed since the last one.
    pub fn update(&mut self, raw: u16) -> PinDelta {
        let current = raw ^ self.invert_mask;
        let delta = PinDelta::new(self.pins, current);
        self.pins = current;
        delta
    }

    /// Forget the snapshot (everything released).
    pub fn reset(&mut self) {
        self.pins = ALL_RELEASED;
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::string::ToString;
    use std::vec::Vec;

    #[test]
    fn low_bits_are_presses() {
        let mut tracker = PinTracker::new(0);
        let delta = tracker.update(0xFFFF & !(1 << 3) & !(1 << 4));
        let t: Vec<_> = delta.transitions().collect();
        assert_eq!(t, [Transition::Pressed(3), Transition::Pressed(4)]);

        let delta = tracker.update(0xFFFF & !(1 << 4));
        let t: Vec<_> = delta.transitions().collect();
        assert_eq!(t, [Transition::Released(3)]);
        assert_eq!(delta.to_string(), "P3^");
    }

    #[test]
    fn unchanged_reading_is_empty() {
        let mut tracker = PinTracker::new(0);
        assert!(tracker.update(0xFFFF).is_empty());
    }

    #[test]
    fn invert_mask_flips_polarity() {
        let mut tracker = PinTracker::new(0x0001);
        // pin 0 wired active-high: raw 1 means pressed
        let delta = tracker.update(0xFFFF);
        assert_eq!(delta.transitions().collect::<Vec<_>>(), [Transition::Pressed(0)]);
        assert_eq!(tracker.pins(), 0xFFFE);
    }

    #[test]
    fn delta_display_lists_all_changes() {
        let delta = PinDelta::new(0xFFFF, 0xFFFF & !0b101);
        assert_eq!(delta.to_string(), "P0V P2V");
    }
}
