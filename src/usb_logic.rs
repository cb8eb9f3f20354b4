//! USB mount bookkeeping, kept free of the USB stack so it runs on the host.
//!
//! The device counts as mounted while the host has it configured and the bus
//! is not suspended. A suspend hides the mount without forgetting the
//! configuration, so a resume brings it back.

/// Configured and suspended flags as reported by the USB stack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MountState {
    configured: bool,
    suspended: bool,
}

impl MountState {
    pub const fn new() -> Self {
        Self {
            configured: false,
            suspended: false,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.configured && !self.suspended
    }

    /// Device enabled or disabled. Disabling drops the configuration.
    pub fn enabled(&mut self, enabled: bool) -> Option<bool> {
        if enabled {
            return None;
        }
        self.change(|s| *s = Self::new())
    }

    /// Bus reset: the host will enumerate again.
    pub fn reset(&mut self) -> Option<bool> {
        self.change(|s| *s = Self::new())
    }

    pub fn configured(&mut self, configured: bool) -> Option<bool> {
        self.change(|s| s.configured = configured)
    }

    pub fn suspended(&mut self, suspended: bool) -> Option<bool> {
        self.change(|s| s.suspended = suspended)
    }

    /// Apply `f`; returns the new mounted state if it changed.
    fn change(&mut self, f: impl FnOnce(&mut Self)) -> Option<bool> {
        let before = self.is_mounted();
        f(self);
        let after = self.is_mounted();
        (before != after).then_some(after)
    }
}

/// Notices unmounts from a running count, so two unmounts between looks
/// still read as one and a quick remount never hides one.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnmountWatch {
    seen: u32,
}

impl UnmountWatch {
    pub const fn new() -> Self {
        Self { seen: 0 }
    }

    /// `true` if `count` moved since the last call.
    pub fn check(&mut self, count: u32) -> bool {
        let moved = count != self.seen;
        self.seen = count;
        moved
    }
}
