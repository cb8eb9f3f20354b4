//! Static button → HID action bindings.
//!
//! Every (node, button) pair owns one [`HidBinding`]: up to four actions
//! fired together plus the auto-repeat timing. The table is immutable
//! once built; the engine refers to entries by [`BindingId`].

use super::gamepad::buttons as pad;
use super::keyboard::keys;
use super::mouse::{Axis, BUTTON_LEFT, BUTTON_MIDDLE, BUTTON_RIGHT};
use crate::config::{ACTIONS_PER_BINDING, BUTTON_COUNT, MAX_NODES};

/// One HID effect of a button.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidAction {
    /// Unused action slot.
    #[default]
    None,
    /// Key usage code plus modifier bits. A keycode of 0 is modifier-only.
    Keyboard { keycode: u8, modifiers: u8 },
    /// Mouse button index (0 = left, 1 = right, 2 = middle).
    MouseButton(u8),
    /// Relative motion added on press and on every repeat.
    MouseAxis { axis: Axis, delta: i8 },
    /// Gamepad button index (0..32).
    GamepadButton(u8),
}

impl HidAction {
    /// Plain key without modifiers.
    pub const fn key(keycode: u8) -> Self {
        HidAction::Keyboard {
            keycode,
            modifiers: 0,
        }
    }
}

/// The actions and repeat timing of one button.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HidBinding {
    pub actions: [HidAction; ACTIONS_PER_BINDING],
    /// Delay from press to the first repeat (ms).
    pub first_delay_ms: u16,
    /// Delay between repeats (ms); 0 disables auto-repeat.
    pub next_delay_ms: u16,
}

impl HidBinding {
    /// A button that does nothing.
    pub const UNBOUND: Self = Self {
        actions: [HidAction::None; ACTIONS_PER_BINDING],
        first_delay_ms: 0,
        next_delay_ms: 0,
    };

    /// Single-action binding.
    pub const fn single(action: HidAction, first_delay_ms: u16, next_delay_ms: u16) -> Self {
        Self {
            actions: [action, HidAction::None, HidAction::None, HidAction::None],
            first_delay_ms,
            next_delay_ms,
        }
    }

    /// `true` if the button auto-repeats while held.
    pub fn repeats(&self) -> bool {
        self.next_delay_ms > 0
    }

    /// Non-empty actions.
    pub fn active_actions(&self) -> impl Iterator<Item = &HidAction> {
        self.actions.iter().filter(|a| **a != HidAction::None)
    }
}

/// Handle to a table entry, recorded by the engine at press time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BindingId {
    pub node: u8,
    pub button: u8,
}

/// Bindings for every node and button.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingTable {
    bindings: [[HidBinding; BUTTON_COUNT]; MAX_NODES],
}

impl Default for BindingTable {
    fn default() -> Self {
        default_bindings()
    }
}

impl BindingTable {
    /// Table with every button unbound.
    pub const fn empty() -> Self {
        Self {
            bindings: [[HidBinding::UNBOUND; BUTTON_COUNT]; MAX_NODES],
        }
    }

    /// Builder-style setter used when assembling a table.
    pub fn with(mut self, node: usize, button: usize, binding: HidBinding) -> Self {
        if node < MAX_NODES && button < BUTTON_COUNT {
            self.bindings[node][button] = binding;
        }
        self
    }

    /// Resolve a (node index, button index) pair.
    pub fn id(&self, node: usize, button: usize) -> Option<BindingId> {
        (node < MAX_NODES && button < BUTTON_COUNT).then_some(BindingId {
            node: node as u8,
            button: button as u8,
        })
    }

    /// Binding behind an id.
    pub fn get(&self, id: BindingId) -> &HidBinding {
        &self.bindings[id.node as usize][id.button as usize]
    }
}

/// Repeat timing of the stock layout.
const FIRST: u16 = 400;
const NEXT: u16 = 250;

/// Stock layout:
///
/// | node | buttons 0-7 |
/// |------|-------------|
/// | TX1  | gamepad A, B, X, Y, D-pad left/up/right/down |
/// | TX2  | keys 1 2 3 4 A W D S |
/// | TX3  | keys 5 6 7 8 J I L K |
/// | TX4  | mouse left/middle/right, key 9, move left/up/right/down by 10 |
///
/// Buttons 8-15 are unbound on every node.
pub fn default_bindings() -> BindingTable {
    let gamepad = [
        pad::A,
        pad::B,
        pad::X,
        pad::Y,
        pad::DPAD_LEFT,
        pad::DPAD_UP,
        pad::DPAD_RIGHT,
        pad::DPAD_DOWN,
    ];
    let left_keys = [
        keys::NUM_1,
        keys::NUM_2,
        keys::NUM_3,
        keys::NUM_4,
        keys::A,
        keys::W,
        keys::D,
        keys::S,
    ];
    let right_keys = [
        keys::NUM_5,
        keys::NUM_6,
        keys::NUM_7,
        keys::NUM_8,
        keys::J,
        keys::I,
        keys::L,
        keys::K,
    ];
    let pointer = [
        HidAction::MouseButton(BUTTON_LEFT),
        HidAction::MouseButton(BUTTON_MIDDLE),
        HidAction::MouseButton(BUTTON_RIGHT),
        HidAction::key(keys::NUM_9),
        HidAction::MouseAxis { axis: Axis::X, delta: -10 },
        HidAction::MouseAxis { axis: Axis::Y, delta: -10 },
        HidAction::MouseAxis { axis: Axis::X, delta: 10 },
        HidAction::MouseAxis { axis: Axis::Y, delta: 10 },
    ];

    let mut table = BindingTable::empty();
    for button in 0..8 {
        table.bindings[0][button] =
            HidBinding::single(HidAction::GamepadButton(gamepad[button]), FIRST, NEXT);
        table.bindings[1][button] = HidBinding::single(HidAction::key(left_keys[button]), FIRST, NEXT);
        table.bindings[2][button] =
            HidBinding::single(HidAction::key(right_keys[button]), FIRST, NEXT);
        table.bindings[3][button] = HidBinding::single(pointer[button], FIRST, NEXT);
    }
    table
}
