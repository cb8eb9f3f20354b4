//! Per-peer link liveness.
//!
//! A peer is `Up` while it was heard within [`LINK_DOWN_MS`].

use crate::config::LINK_DOWN_MS;
use log::info;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    #[default]
    Down,
    Up,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkMonitor {
    state: LinkState,
    last_packet_ms: Option<u64>,
}

impl LinkMonitor {
    pub const fn new() -> Self {
        Self {
            state: LinkState::Down,
            last_packet_ms: None,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_up(&self) -> bool {
        self.state == LinkState::Up
    }

    pub fn last_packet_ms(&self) -> Option<u64> {
        self.last_packet_ms
    }

    /// A frame from the peer arrived. Returns the new state on a change.
    pub fn note_packet(&mut self, now_ms: u64) -> Option<LinkState> {
        self.last_packet_ms = Some(now_ms);
        self.transition(LinkState::Up)
    }

    /// Re-evaluate after time passed. Returns the new state on a change.
    pub fn update(&mut self, now_ms: u64) -> Option<LinkState> {
        let fresh = self
            .last_packet_ms
            .is_some_and(|at| now_ms.saturating_sub(at) <= LINK_DOWN_MS);
        self.transition(if fresh { LinkState::Up } else { LinkState::Down })
    }

    fn transition(&mut self, next: LinkState) -> Option<LinkState> {
        if self.state == next {
            return None;
        }
        self.state = next;
        info!("link {:?}", next);
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_down_and_comes_up_on_packet() {
        let mut link = LinkMonitor::new();
        assert_eq!(link.update(0), None);
        assert!(!link.is_up());
        assert_eq!(link.note_packet(100), Some(LinkState::Up));
        assert_eq!(link.note_packet(200), None);
    }

    #[test]
    fn goes_down_after_silence() {
        let mut link = LinkMonitor::new();
        link.note_packet(1_000);
        assert_eq!(link.update(1_000 + LINK_DOWN_MS), None);
        assert_eq!(link.update(1_001 + LINK_DOWN_MS), Some(LinkState::Down));
        assert_eq!(link.last_packet_ms(), Some(1_000));
    }
}
