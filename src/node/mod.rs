//! The two roles a board can boot into.
//!
//! A [`TxNode`] reads its buttons and relays them over the radio; the
//! [`RxNode`] hands out addresses and turns every node's buttons into USB
//! HID reports. Each owns all of its state and is driven from one loop.

pub mod rx;
pub mod tx;

pub use rx::{RxEvent, RxNode};
pub use tx::TxNode;

/// Which role the board runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    Tx,
    Rx,
}
