//! rf2usb: relay button pins from RFM69 transmitter nodes to a USB
//! keyboard, mouse and gamepad.
//!
//! The protocol, HID engine, registry and storage logic build for the host
//! and are tested there (`cargo test`). The hardware glue (radio and
//! expander drivers, USB, display, flash, defmt logging) is compiled only
//! with the `embedded` feature and is driven from `main.rs`.

#![cfg_attr(not(test), no_std)]

// ═══════════════════════════════════════════════════════════════════════════
// Host-testable core
// ═══════════════════════════════════════════════════════════════════════════

pub mod config;
pub mod error;
pub mod hid;
pub mod link;
pub mod node;
pub mod pins;
pub mod protocol;
pub mod storage;
pub mod ui;
pub mod usb_logic;

// ═══════════════════════════════════════════════════════════════════════════
// Hardware glue
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(feature = "embedded")]
pub mod drivers;
#[cfg(feature = "embedded")]
pub mod logging;
#[cfg(feature = "embedded")]
pub mod usb;

#[cfg(test)]
mod testing;

pub use error::Error;
