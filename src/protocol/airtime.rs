//! Rolling airtime accounting for duty-cycle reporting.
//!
//! Every transmission is recorded with its on-air duration. Entries older
//! than [`AIRTIME_WINDOW_MS`] fall out of the window; the running sum
//! gives the duty cycle. Figures from here go into every status packet.

use crate::config::{AIRTIME_BUFFER_LEN, AIRTIME_WINDOW_MS};
use heapless::Deque;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Transmission {
    at_ms: u64,
    duration_us: u32,
}

/// Snapshot of the window.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AirtimeStats {
    pub last_ms: f32,
    pub average_ms: f32,
    pub duty_percent: f32,
}

/// Last [`AIRTIME_BUFFER_LEN`] transmissions within the window.
#[derive(Debug, Default)]
pub struct AirtimeTracker {
    window: Deque<Transmission, AIRTIME_BUFFER_LEN>,
    sum_us: u64,
    last_us: u32,
}

impl AirtimeTracker {
    pub const fn new() -> Self {
        Self {
            window: Deque::new(),
            sum_us: 0,
            last_us: 0,
        }
    }

    /// Record one transmission that ended at `now_ms`.
    pub fn record(&mut self, now_ms: u64, duration_us: u32) {
        self.evict(now_ms);
        if self.window.is_full() {
            self.pop_oldest();
        }
        // Cannot fail: a slot was freed above when full.
        let _ = self.window.push_back(Transmission {
            at_ms: now_ms,
            duration_us,
        });
        self.sum_us += u64::from(duration_us);
        self.last_us = duration_us;
    }

    /// Drop entries that left the window.
    pub fn evict(&mut self, now_ms: u64) {
        while let Some(oldest) = self.window.front() {
            if now_ms.saturating_sub(oldest.at_ms) <= AIRTIME_WINDOW_MS {
                break;
            }
            self.pop_oldest();
        }
    }

    fn pop_oldest(&mut self) {
        if let Some(old) = self.window.pop_front() {
            self.sum_us -= u64::from(old.duration_us);
        }
    }

    /// Duration of the most recent transmission (µs).
    pub fn last_us(&self) -> u32 {
        self.last_us
    }

    /// Total airtime within the window (µs).
    pub fn total_us(&self) -> u64 {
        self.sum_us
    }

    /// Transmissions within the window.
    pub fn count(&self) -> usize {
        self.window.len()
    }

    /// Last airtime in 0.1 ms units, as carried on the wire.
    pub fn last_airtime_field(&self) -> u16 {
        u16::try_from(self.last_us / 100).unwrap_or(u16::MAX)
    }

    /// Rolling total in ms, as carried on the wire.
    pub fn total_field(&self) -> u16 {
        u16::try_from(self.sum_us / 1000).unwrap_or(u16::MAX)
    }

    /// Figures for display, after evicting stale entries.
    pub fn stats(&mut self, now_ms: u64) -> AirtimeStats {
        self.evict(now_ms);
        let count = self.window.len();
        let average_us = if count == 0 {
            0.0
        } else {
            self.sum_us as f32 / count as f32
        };
        AirtimeStats {
            last_ms: self.last_us as f32 / 1000.0,
            average_ms: average_us / 1000.0,
            duty_percent: self.sum_us as f32 / (AIRTIME_WINDOW_MS as f32 * 1000.0) * 100.0,
        }
    }
}
