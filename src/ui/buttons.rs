//! Menu button (active-low with internal pull-up).
//!
//! Sampled from the transmitter loop rather than edge-driven so the long
//! press can be timed while the button is still held.

use crate::ui::input_logic::{Debouncer, LongPress, MenuEvent};
use defmt::info;
use embassy_nrf::gpio::{AnyPin, Input, Pull};

pub struct MenuButton {
    pin: Input<'static>,
    debounce: Debouncer,
    gesture: LongPress,
}

impl MenuButton {
    pub fn new(pin: AnyPin) -> Self {
        Self {
            pin: Input::new(pin, Pull::Up),
            debounce: Debouncer::new(),
            gesture: LongPress::new(),
        }
    }

    /// `true` while a "next address" preview is showing.
    pub fn is_previewing(&self) -> bool {
        self.gesture.is_previewing()
    }

    /// Sample the pin. `current` is the node's address right now.
    pub fn poll(&mut self, now_ms: u64, current: u8) -> Option<MenuEvent> {
        let pressed = self.debounce.update(self.pin.is_low(), now_ms);
        let event = self.gesture.update(pressed, now_ms, current);
        if let Some(event) = event {
            info!("Menu: {}", event);
        }
        event
    }
}
