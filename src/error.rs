//! Unified error types for rf2usb.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Radio
    /// The radio driver failed to send or receive.
    Radio(RadioError),

    /// A received frame could not be decoded.
    Wire(WireError),

    // USB
    /// The HID transport refused a report.
    Transport(TransportError),

    // Storage
    /// Flash read/write/erase failed.
    Storage(StorageError),

    // UI / Display
    /// I²C transaction to the display failed.
    Display,

    // Generic
    /// Buffer too small for the requested operation.
    BufferOverflow,

    /// Operation timed out.
    Timeout,
}

/// Radio driver errors (SPI or chip state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    /// SPI transaction failed.
    Bus,
    /// The chip did not report the expected version register.
    NotDetected,
    /// Frame does not fit into the radio FIFO.
    FrameTooLong,
    /// The chip never signalled packet-sent / payload-ready.
    Timeout,
}

/// Frame encode/decode errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WireError {
    /// Input shorter than the layout its type code requires.
    Truncated,
    /// Unknown packet type code.
    UnknownType(u8),
    /// Output buffer too small.
    BufferTooSmall,
}

/// HID transport errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// USB is not configured by a host.
    NotReady,
    /// The report queue is full.
    Busy,
}

/// Persistent storage errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Flash (or the backing map) could not be read.
    Read,
    /// Flash (or the backing map) could not be written.
    Write,
    /// A record exists but does not decode.
    Corrupt,
    /// No record stored under the requested key.
    Missing,
}

// Convenience conversions

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        Error::Radio(e)
    }
}

impl From<WireError> for Error {
    fn from(e: WireError) -> Self {
        Error::Wire(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::Storage(e)
    }
}
