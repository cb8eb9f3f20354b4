//! Peripheral drivers for the bridge board.

pub mod pcf8575;
pub mod rfm69;

pub use pcf8575::Pcf8575;
pub use rfm69::Rfm69;
