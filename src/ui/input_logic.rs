//! Menu button gestures, kept free of hardware so they run on the host.
//!
//! Holding the menu button for [`LONG_PRESS_MS`] previews the next node
//! address; letting go afterwards commits it. A shorter press does nothing.

use crate::config::{BUTTON_DEBOUNCE_MS, LONG_PRESS_MS};
use crate::protocol::identity::next_address;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MenuEvent {
    /// Long press reached; show `target` until release.
    Preview(u8),
    /// Released after a long press; request `target`.
    Commit(u8),
}

/// Accepts a level only after it held steady for [`BUTTON_DEBOUNCE_MS`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Debouncer {
    stable: bool,
    raw: bool,
    raw_since_ms: u64,
}

impl Debouncer {
    pub const fn new() -> Self {
        Self {
            stable: false,
            raw: false,
            raw_since_ms: 0,
        }
    }

    /// Feed a raw sample, get the debounced level.
    pub fn update(&mut self, raw: bool, now_ms: u64) -> bool {
        if raw != self.raw {
            self.raw = raw;
            self.raw_since_ms = now_ms;
        }
        if self.raw != self.stable && now_ms.saturating_sub(self.raw_since_ms) >= BUTTON_DEBOUNCE_MS {
            self.stable = self.raw;
        }
        self.stable
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Hold {
    #[default]
    Idle,
    Pressed { since_ms: u64 },
    Previewing { target: u8 },
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LongPress {
    hold: Hold,
}

impl LongPress {
    pub const fn new() -> Self {
        Self { hold: Hold::Idle }
    }

    /// `true` while a preview is on screen.
    pub fn is_previewing(&self) -> bool {
        matches!(self.hold, Hold::Previewing { .. })
    }

    /// Feed one debounced sample of the button. `current` is the address
    /// the node holds now (0 when unassigned).
    pub fn update(&mut self, pressed: bool, now_ms: u64, current: u8) -> Option<MenuEvent> {
        match (self.hold, pressed) {
            (Hold::Idle, true) => {
                self.hold = Hold::Pressed { since_ms: now_ms };
                None
            }
            (Hold::Pressed { since_ms }, true) if now_ms.saturating_sub(since_ms) >= LONG_PRESS_MS => {
                let target = next_address(current);
                self.hold = Hold::Previewing { target };
                Some(MenuEvent::Preview(target))
            }
            (Hold::Previewing { target }, false) => {
                self.hold = Hold::Idle;
                Some(MenuEvent::Commit(target))
            }
            (_, false) => {
                self.hold = Hold::Idle;
                None
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_NODES;

    #[test]
    fn debouncer_ignores_bounces() {
        let mut db = Debouncer::new();
        assert!(!db.update(true, 0));
        assert!(!db.update(false, 10));
        assert!(!db.update(true, 20));
        assert!(!db.update(true, 20 + BUTTON_DEBOUNCE_MS - 1));
        assert!(db.update(true, 20 + BUTTON_DEBOUNCE_MS));
        assert!(db.update(false, 100), "release also needs to settle");
        assert!(!db.update(false, 100 + BUTTON_DEBOUNCE_MS));
    }

    #[test]
    fn short_press_is_ignored() {
        let mut lp = LongPress::new();
        assert_eq!(lp.update(true, 0, 1), None);
        assert_eq!(lp.update(true, LONG_PRESS_MS - 1, 1), None);
        assert_eq!(lp.update(false, LONG_PRESS_MS - 1, 1), None);
        assert!(!lp.is_previewing());
    }

    #[test]
    fn long_press_previews_then_commits_on_release() {
        let mut lp = LongPress::new();
        lp.update(true, 100, 2);
        assert_eq!(lp.update(true, 100 + LONG_PRESS_MS, 2), Some(MenuEvent::Preview(3)));
        assert!(lp.is_previewing());
        assert_eq!(lp.update(true, 5_000, 2), None, "preview fires once");
        assert_eq!(lp.update(false, 5_100, 2), Some(MenuEvent::Commit(3)));
        assert!(!lp.is_previewing());
    }

    #[test]
    fn preview_wraps_and_starts_from_one() {
        let mut lp = LongPress::new();
        lp.update(true, 0, MAX_NODES as u8);
        assert_eq!(lp.update(true, LONG_PRESS_MS, MAX_NODES as u8), Some(MenuEvent::Preview(1)));

        let mut lp = LongPress::new();
        lp.update(true, 0, 0);
        assert_eq!(lp.update(true, LONG_PRESS_MS, 0), Some(MenuEvent::Preview(1)));
    }
}
