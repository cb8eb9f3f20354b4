//! HID report types, bindings and the multi-node aggregation engine.
//!
//! Radio pin transitions go in through [`engine::HidEngine`], which merges
//! every node's held buttons into one keyboard, one mouse and one gamepad
//! report and pushes them to a [`HidTransport`] only when they changed.

pub mod binding;
pub mod engine;
pub mod gamepad;
pub mod keyboard;
pub mod mouse;


use crate::error::TransportError;

pub use binding::{default_bindings, BindingId, BindingTable, HidAction, HidBinding};
pub use engine::HidEngine;
pub use gamepad::GamepadReport;
pub use keyboard::KeyboardReport;
pub use mouse::{Axis, MouseReport};

/// One report ready for a USB HID endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidReport {
    Keyboard(KeyboardReport),
    Mouse(MouseReport),
    Gamepad(GamepadReport),
}

impl HidReport {
    /// Serialise the payload (without report ID). Returns bytes written.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        match self {
            HidReport::Keyboard(k) => k.serialize(buf),
            HidReport::Mouse(m) => m.serialize(buf),
            HidReport::Gamepad(g) => g.serialize(buf),
        }
    }

    pub fn is_keyboard(&self) -> bool {
        matches!(self, HidReport::Keyboard(_))
    }

    pub fn is_mouse(&self) -> bool {
        matches!(self, HidReport::Mouse(_))
    }

    pub fn is_gamepad(&self) -> bool {
        matches!(self, HidReport::Gamepad(_))
    }
}

/// Sink for finished reports (the USB device on target).
pub trait HidTransport {
    /// `true` when the host has the device mounted and a report fits.
    fn is_ready(&self) -> bool;

    /// Queue one report. Must not block.
    fn send(&mut self, report: HidReport) -> Result<(), TransportError>;
}
