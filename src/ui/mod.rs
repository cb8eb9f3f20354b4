//! User interface - 128×32 OLED status screens and the menu button.
//!
//! Text for each screen line is built here so it can be checked on the
//! host; [`display`] only places the lines on the panel.
//!
//! ## Screens
//!
//! - **TX**: address and link, sequence counter, last pin change, airtime
//! - **RX**: RSSI of every node (or `--` while its link is down), last event
//! - **Preview**: next address while the menu button is held
//! - **Message**: transient assignment result, held for [`MESSAGE_HOLD_MS`]

#[cfg(feature = "embedded")]
pub mod buttons;
#[cfg(feature = "embedded")]
pub mod display;
pub mod input_logic;

use core::fmt::Write;

use crate::config::{MAX_NODES, MESSAGE_HOLD_MS};
use crate::link::LinkState;
use crate::node::RxEvent;
use crate::pins::PinDelta;
use crate::protocol::airtime::AirtimeStats;
use crate::protocol::transmitter::{AssignmentEvent, TxMode};
use heapless::String;

/// Characters per row with the 6×10 font.
pub const LINE_CHARS: usize = 21;

pub type Line = String<LINE_CHARS>;

/// Screens (views) the UI can be in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Screen {
    /// Role status.
    Home,
    /// Long press preview of the next address.
    Preview(u8),
    /// Transient message.
    Message,
}

fn line(args: core::fmt::Arguments<'_>) -> Line {
    let mut out = Line::new();
    // overflow only truncates the row
    let _ = out.write_fmt(args);
    out
}

/// `ID2 A Pedal`: address, assignment state (Ephemeral/Requesting/Assigned), name.
pub fn tx_identity_line(address: u8, name: &str, mode: TxMode) -> Line {
    let state = match mode {
        TxMode::Ephemeral => "E",
        TxMode::Requesting { .. } => "R",
        TxMode::Assigned => "A",
    };
    let mut out = line(format_args!("ID{} {}", address, state));
    let _ = out.push(' ');
    for c in name.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// `Seq:42 I P3V P4^`.
pub fn tx_activity_line(seq: u32, delta: Option<&PinDelta>) -> Line {
    match delta.filter(|d| !d.is_empty()) {
        Some(delta) => line(format_args!("Seq:{} I {}", seq, delta)),
        None => line(format_args!("Seq:{}", seq)),
    }
}

/// `Air 1.5ms 0.2%`.
pub fn airtime_line(stats: &AirtimeStats) -> Line {
    line(format_args!("Air {:.1}ms {:.1}%", stats.last_ms, stats.duty_percent))
}

/// Two nodes per row: `TX1:-60   TX2:--`.
pub fn rx_link_lines(nodes: &[(LinkState, i16); MAX_NODES]) -> [Line; 2] {
    let cell = |index: usize| -> Line {
        match nodes.get(index) {
            Some((LinkState::Up, rssi)) => line(format_args!("TX{}:{}", index + 1, rssi)),
            Some((LinkState::Down, _)) => line(format_args!("TX{}:--", index + 1)),
            None => Line::new(),
        }
    };
    let row = |first: usize| -> Line {
        let (left, right) = (cell(first), cell(first + 1));
        line(format_args!("{:<10}{}", left.as_str(), right.as_str()))
    };
    [row(0), row(2)]
}

/// Text shown after an assignment attempt.
pub fn assignment_message(event: &AssignmentEvent) -> Line {
    match event {
        AssignmentEvent::Assigned { address, name } => line(format_args!("Saved ID{} {}", address, name)),
        AssignmentEvent::Denied { reason, .. } => line(format_args!("Denied: {}", reason.message())),
    }
}

/// Last receiver event, one row.
pub fn rx_event_line(event: &RxEvent) -> Line {
    match event {
        RxEvent::Pins { address, delta } => line(format_args!("TX{} {}", address, delta)),
        RxEvent::Discovered(fingerprint) => line(format_args!("New node {}", fingerprint)),
        RxEvent::Assigned(grant) => line(format_args!("ID{} {}", grant.address, grant.name)),
        RxEvent::Refused { address, reason } => line(format_args!("ID{} {}", address, reason.message())),
    }
}

/// Keeps a message on screen for [`MESSAGE_HOLD_MS`].
#[derive(Clone, Debug, Default)]
pub struct MessageHold {
    text: Line,
    until_ms: Option<u64>,
}

impl MessageHold {
    pub const fn new() -> Self {
        Self {
            text: String::new(),
            until_ms: None,
        }
    }

    pub fn show(&mut self, text: Line, now_ms: u64) {
        self.text = text;
        self.until_ms = Some(now_ms + MESSAGE_HOLD_MS);
    }

    /// The message, while it is still due.
    pub fn current(&mut self, now_ms: u64) -> Option<&str> {
        match self.until_ms {
            Some(until) if now_ms < until => Some(self.text.as_str()),
            Some(_) => {
                self.until_ms = None;
                None
            }
            None => None,
        }
    }
}
