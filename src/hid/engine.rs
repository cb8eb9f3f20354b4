//! Multi-node HID aggregation engine.
//!
//! Each (node, button) pair has a [`HidRuntime`]. Presses OR their actions
//! into shared keyboard/mouse/gamepad state; a release only clears a key or
//! button bit when no other held pair still contributes it, so two nodes
//! holding the same key never release each other's press.
//!
//! Reports are not sent from `press`/`release`. They set dirty flags and
//! [`HidEngine::flush`] sends at most one report per type, only when the
//! transport is ready. Held buttons with auto-repeat are driven by
//! [`HidEngine::tick`].

use super::binding::{BindingId, BindingTable, HidAction};
use super::gamepad::{GamepadReport, GAMEPAD_BUTTON_COUNT};
use super::keyboard::KeyboardReport;
use super::mouse::{clamp_axis, Axis, MouseReport};
use super::{HidReport, HidTransport};
use crate::config::{BUTTON_COUNT, MAX_NODES};
use heapless::Vec;
use log::{debug, trace};

/// Upper bound on distinct keycodes waiting for a repeat pulse.
const PULSE_QUEUE_LEN: usize = MAX_NODES * BUTTON_COUNT;

/// Runtime state of one (node, button) pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HidRuntime {
    /// Binding captured at press time; `Some` exactly while pressed.
    pub active: Option<BindingId>,
    pub press_start_ms: u64,
    pub next_repeat_ms: u64,
}

impl HidRuntime {
    pub fn is_pressed(&self) -> bool {
        self.active.is_some()
    }
}

/// Aggregates every node's button state into USB HID reports.
pub struct HidEngine {
    bindings: BindingTable,
    runtime: [[HidRuntime; BUTTON_COUNT]; MAX_NODES],

    keyboard: KeyboardReport,
    keyboard_dirty: bool,
    /// Keycodes that need a release+press pulse on the next flush.
    repeat_pulses: Vec<u8, PULSE_QUEUE_LEN>,

    mouse_buttons: u8,
    /// Pending X, Y, wheel displacement, each within -127..=127.
    motion: [i16; 3],
    mouse_dirty: bool,

    gamepad: GamepadReport,
    gamepad_dirty: bool,
}

fn axis_slot(axis: Axis) -> usize {
    match axis {
        Axis::X => 0,
        Axis::Y => 1,
        Axis::Wheel => 2,
    }
}

impl HidEngine {
    /// Idle engine over an immutable binding table.
    pub fn new(bindings: BindingTable) -> Self {
        Self {
            bindings,
            runtime: [[HidRuntime::default(); BUTTON_COUNT]; MAX_NODES],
            keyboard: KeyboardReport::empty(),
            keyboard_dirty: false,
            repeat_pulses: Vec::new(),
            mouse_buttons: 0,
            motion: [0; 3],
            mouse_dirty: false,
            gamepad: GamepadReport::empty(),
            gamepad_dirty: false,
        }
    }

    /// Binding table in use.
    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// Button `button` of node index `node` went down.
    ///
    /// Out-of-range indices and repeated presses without a release are
    /// ignored.
    pub fn press(&mut self, node: usize, button: usize, now_ms: u64) {
        let Some(id) = self.bindings.id(node, button) else {
            return;
        };
        if self.runtime[node][button].is_pressed() {
            trace!("node {} button {} already held", node, button);
            return;
        }

        let binding = *self.bindings.get(id);
        self.runtime[node][button] = HidRuntime {
            active: Some(id),
            press_start_ms: now_ms,
            next_repeat_ms: now_ms + u64::from(binding.first_delay_ms),
        };

        for action in binding.active_actions() {
            match *action {
                HidAction::None => {}
                HidAction::Keyboard { keycode, modifiers } => {
                    if keycode != 0 && !self.keyboard.contains(keycode) {
                        if self.keyboard.insert(keycode) {
                            self.keyboard_dirty = true;
                        } else {
                            debug!("rollover full, dropping key {:#04x}", keycode);
                        }
                    }
                    if modifiers & !self.keyboard.modifier != 0 {
                        self.keyboard.modifier |= modifiers;
                        self.keyboard_dirty = true;
                    }
                }
                HidAction::MouseButton(index) if index < 8 => {
                    self.mouse_buttons |= 1 << index;
                    self.mouse_dirty = true;
                }
                HidAction::MouseButton(_) => {}
                HidAction::MouseAxis { axis, delta } => {
                    let slot = axis_slot(axis);
                    self.motion[slot] = clamp_axis(self.motion[slot] + i16::from(delta));
                    self.mouse_dirty = true;
                }
                HidAction::GamepadButton(index) if index < GAMEPAD_BUTTON_COUNT => {
                    self.gamepad.buttons |= 1 << index;
                    self.gamepad_dirty = true;
                }
                HidAction::GamepadButton(_) => {}
            }
        }
        debug!("press node {} button {}", node, button);
    }

    /// Button `button` of node index `node` went up.
    ///
    /// Releases exactly the actions of the binding captured at press time.
    /// A key or button bit survives while any other held pair contributes
    /// it; modifiers are recomputed from every pair still held.
    pub fn release(&mut self, node: usize, button: usize, _now_ms: u64) {
        if node >= MAX_NODES || button >= BUTTON_COUNT {
            return;
        }
        let Some(id) = self.runtime[node][button].active else {
            return;
        };
        self.runtime[node][button] = HidRuntime::default();

        let binding = *self.bindings.get(id);
        for action in binding.active_actions() {
            match *action {
                HidAction::Keyboard { keycode, .. } if keycode != 0 => {
                    let held = self.any_held(|a| {
                        matches!(a, HidAction::Keyboard { keycode: k, .. } if *k == keycode)
                    });
                    if !held && self.keyboard.remove(keycode) {
                        self.keyboard_dirty = true;
                    }
                }
                HidAction::MouseButton(index) if index < 8 => {
                    let held = self.any_held(|a| *a == HidAction::MouseButton(index));
                    if !held && self.mouse_buttons & (1 << index) != 0 {
                        self.mouse_buttons &= !(1 << index);
                        self.mouse_dirty = true;
                    }
                }
                HidAction::GamepadButton(index) if index < GAMEPAD_BUTTON_COUNT => {
                    let held = self.any_held(|a| *a == HidAction::GamepadButton(index));
                    if !held && self.gamepad.is_pressed(index) {
                        self.gamepad.buttons &= !(1 << index);
                        self.gamepad_dirty = true;
                    }
                }
                _ => {}
            }
        }

        let modifiers = self.held_modifiers();
        if modifiers != self.keyboard.modifier {
            self.keyboard.modifier = modifiers;
            self.keyboard_dirty = true;
        }
        debug!("release node {} button {}", node, button);
    }

    /// Fire auto-repeat for every held pair whose repeat time has come.
    ///
    /// Axis deltas of all firing pairs are summed and clamped once.
    pub fn tick(&mut self, now_ms: u64) {
        let mut motion = [0i16; 3];
        let mut moved = false;

        for node in 0..MAX_NODES {
            for button in 0..BUTTON_COUNT {
                let Some(id) = self.runtime[node][button].active else {
                    continue;
                };
                let binding = *self.bindings.get(id);
                if !binding.repeats() || now_ms < self.runtime[node][button].next_repeat_ms {
                    continue;
                }
                self.runtime[node][button].next_repeat_ms =
                    now_ms + u64::from(binding.next_delay_ms);

                for action in binding.active_actions() {
                    match *action {
                        HidAction::Keyboard { keycode, .. } if keycode != 0 => {
                            if !self.repeat_pulses.contains(&keycode) {
                                let _ = self.repeat_pulses.push(keycode);
                            }
                            self.keyboard_dirty = true;
                        }
                        HidAction::MouseButton(_) => self.mouse_dirty = true,
                        HidAction::MouseAxis { axis, delta } => {
                            let slot = axis_slot(axis);
                            motion[slot] = motion[slot].saturating_add(i16::from(delta));
                            moved = true;
                        }
                        HidAction::GamepadButton(_) => self.gamepad_dirty = true,
                        _ => {}
                    }
                }
            }
        }

        if moved {
            for (pending, extra) in self.motion.iter_mut().zip(motion) {
                *pending = clamp_axis(pending.saturating_add(extra));
            }
            self.mouse_dirty = true;
        }
    }

    /// Send dirty reports. Returns the number of reports accepted.
    ///
    /// Nothing happens while the transport is not ready; dirty state is
    /// kept for the next call. A report the transport refuses stays dirty.
    pub fn flush<T: HidTransport>(&mut self, transport: &mut T) -> usize {
        if !transport.is_ready() {
            return 0;
        }
        let mut sent = 0;

        for &keycode in self.repeat_pulses.iter() {
            if !self.keyboard.contains(keycode) {
                continue;
            }
            if transport.send(HidReport::Keyboard(self.keyboard.without(keycode))).is_ok() {
                sent += 1;
            }
            if transport.send(HidReport::Keyboard(self.keyboard)).is_ok() {
                sent += 1;
                self.keyboard_dirty = false;
            }
        }
        self.repeat_pulses.clear();

        if self.keyboard_dirty {
            match transport.send(HidReport::Keyboard(self.keyboard)) {
                Ok(()) => {
                    self.keyboard_dirty = false;
                    sent += 1;
                }
                Err(e) => debug!("keyboard report deferred: {:?}", e),
            }
        }

        if self.mouse_dirty {
            let [dx, dy, wheel] = self.motion;
            let report = MouseReport::from_motion(self.mouse_buttons, dx, dy, wheel);
            match transport.send(HidReport::Mouse(report)) {
                Ok(()) => {
                    self.motion = [0; 3];
                    self.mouse_dirty = false;
                    sent += 1;
                }
                Err(e) => debug!("mouse report deferred: {:?}", e),
            }
        }

        if self.gamepad_dirty {
            match transport.send(HidReport::Gamepad(self.gamepad)) {
                Ok(()) => {
                    self.gamepad_dirty = false;
                    sent += 1;
                }
                Err(e) => debug!("gamepad report deferred: {:?}", e),
            }
        }

        sent
    }

    /// Drop every press and clear all reports (USB unmounted).
    pub fn reset(&mut self) {
        self.runtime = [[HidRuntime::default(); BUTTON_COUNT]; MAX_NODES];
        self.keyboard = KeyboardReport::empty();
        self.keyboard_dirty = false;
        self.repeat_pulses.clear();
        self.mouse_buttons = 0;
        self.motion = [0; 3];
        self.mouse_dirty = false;
        self.gamepad = GamepadReport::empty();
        self.gamepad_dirty = false;
        debug!("HID engine reset");
    }

    /// Current aggregated keyboard report.
    pub fn keyboard_report(&self) -> KeyboardReport {
        self.keyboard
    }

    /// Mouse report that the next flush would send.
    pub fn mouse_report(&self) -> MouseReport {
        let [dx, dy, wheel] = self.motion;
        MouseReport::from_motion(self.mouse_buttons, dx, dy, wheel)
    }

    /// Current aggregated gamepad report.
    pub fn gamepad_report(&self) -> GamepadReport {
        self.gamepad
    }

    /// Runtime of a pair, `None` when out of range.
    pub fn runtime(&self, node: usize, button: usize) -> Option<&HidRuntime> {
        self.runtime.get(node)?.get(button)
    }

    pub fn is_pressed(&self, node: usize, button: usize) -> bool {
        self.runtime(node, button).is_some_and(HidRuntime::is_pressed)
    }

    /// `true` if any report is waiting for a flush.
    pub fn is_dirty(&self) -> bool {
        self.keyboard_dirty || self.mouse_dirty || self.gamepad_dirty || !self.repeat_pulses.is_empty()
    }

    fn any_held(&self, mut matches: impl FnMut(&HidAction) -> bool) -> bool {
        self.runtime
            .iter()
            .flatten()
            .filter_map(|rt| rt.active)
            .any(|id| self.bindings.get(id).active_actions().any(&mut matches))
    }

    fn held_modifiers(&self) -> u8 {
        self.runtime
            .iter()
            .flatten()
            .filter_map(|rt| rt.active)
            .flat_map(|id| self.bindings.get(id).active_actions())
            .fold(0, |mods, action| match action {
                HidAction::Keyboard { modifiers, .. } => mods | modifiers,
                _ => mods,
            })
    }
}
