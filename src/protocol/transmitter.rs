//! Transmitter side of address assignment.
//!
//! ```text
//!            request_address(n)                 ack (our fingerprint)
//! Ephemeral ───────────────────► Requesting ───────────────────────► Assigned
//!     ▲                              │
//!     └──── nack / 1 s timeout ──────┘
//! ```
//!
//! An unassigned node advertises its fingerprint every
//! [`ADVERTISE_INTERVAL_MS`]. The request is sent once; the node then waits
//! [`ASSIGN_TIMEOUT_MS`] for a reply. The machine does no I/O itself:
//! [`AssignmentClient::poll`] says what to send and the replies are fed
//! back through [`AssignmentClient::on_ack`] / [`AssignmentClient::on_nack`].

use super::identity::{Fingerprint, NodeName};
use super::wire::{AssignNack, Assignment, NackReason};
use crate::config::{ADVERTISE_INTERVAL_MS, ASSIGN_TIMEOUT_MS};
use log::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxMode {
    /// No address; advertising.
    Ephemeral,
    /// Waiting to send, or waiting for the reply to, a request.
    Requesting { target: u8, sent_at_ms: Option<u64> },
    /// Holding an address.
    Assigned,
}

/// Why a request did not succeed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DenyReason {
    Nack(NackReason),
    Timeout,
}

impl DenyReason {
    pub fn message(self) -> &'static str {
        match self {
            DenyReason::Nack(reason) => reason.message(),
            DenyReason::Timeout => "No reply",
        }
    }
}

/// Outcome surfaced to the UI.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AssignmentEvent {
    Assigned { address: u8, name: NodeName },
    Denied { target: u8, reason: DenyReason },
}

/// What the node should do after a poll.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClientStep {
    Idle,
    Advertise,
    SendRequest { target: u8 },
    Finished(AssignmentEvent),
}

#[derive(Clone, Debug)]
pub struct AssignmentClient {
    mode: TxMode,
    fingerprint: Fingerprint,
    last_advertise_ms: Option<u64>,
}

impl AssignmentClient {
    /// Start `Assigned` if an address was loaded, `Ephemeral` otherwise.
    pub fn new(fingerprint: Fingerprint, assigned: bool) -> Self {
        Self {
            mode: if assigned {
                TxMode::Assigned
            } else {
                TxMode::Ephemeral
            },
            fingerprint,
            last_advertise_ms: None,
        }
    }

    pub fn mode(&self) -> TxMode {
        self.mode
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn is_assigned(&self) -> bool {
        self.mode == TxMode::Assigned
    }

    /// User asked for `target`. Replaces any request in flight.
    pub fn request_address(&mut self, target: u8) {
        info!("requesting address {} (fp {})", target, self.fingerprint);
        self.mode = TxMode::Requesting {
            target,
            sent_at_ms: None,
        };
    }

    /// Advance timers.
    pub fn poll(&mut self, now_ms: u64) -> ClientStep {
        match self.mode {
            TxMode::Ephemeral => {
                let due = self
                    .last_advertise_ms
                    .map_or(true, |at| now_ms.saturating_sub(at) >= ADVERTISE_INTERVAL_MS);
                if due {
                    self.last_advertise_ms = Some(now_ms);
                    ClientStep::Advertise
                } else {
                    ClientStep::Idle
                }
            }
            TxMode::Requesting {
                target,
                sent_at_ms: None,
            } => {
                self.mode = TxMode::Requesting {
                    target,
                    sent_at_ms: Some(now_ms),
                };
                ClientStep::SendRequest { target }
            }
            TxMode::Requesting {
                target,
                sent_at_ms: Some(at),
            } => {
                if now_ms.saturating_sub(at) > ASSIGN_TIMEOUT_MS {
                    warn!("address {} request timed out", target);
                    self.mode = TxMode::Ephemeral;
                    ClientStep::Finished(AssignmentEvent::Denied {
                        target,
                        reason: DenyReason::Timeout,
                    })
                } else {
                    ClientStep::Idle
                }
            }
            TxMode::Assigned => ClientStep::Idle,
        }
    }

    /// Receiver accepted a request. Ignored unless it echoes our
    /// fingerprint while a request is outstanding.
    pub fn on_ack(&mut self, ack: &Assignment) -> Option<AssignmentEvent> {
        if !self.awaiting_reply() || ack.fingerprint != self.fingerprint {
            return None;
        }
        info!("assigned address {} ({})", ack.address, ack.name);
        self.mode = TxMode::Assigned;
        Some(AssignmentEvent::Assigned {
            address: ack.address,
            name: ack.name.clone(),
        })
    }

    /// Receiver refused a request.
    pub fn on_nack(&mut self, nack: &AssignNack) -> Option<AssignmentEvent> {
        let TxMode::Requesting { target, .. } = self.mode else {
            return None;
        };
        if !self.awaiting_reply() || nack.fingerprint != self.fingerprint {
            return None;
        }
        warn!("address {} denied: {}", target, nack.reason.message());
        self.mode = TxMode::Ephemeral;
        Some(AssignmentEvent::Denied {
            target,
            reason: DenyReason::Nack(nack.reason),
        })
    }

    fn awaiting_reply(&self) -> bool {
        matches!(
            self.mode,
            TxMode::Requesting {
                sent_at_ms: Some(_),
                ..
            }
        )
    }
}
