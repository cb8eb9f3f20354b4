//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, and protocol
//! constants live here so they can be tuned in one place.

// Nodes & buttons

/// Maximum number of transmitter nodes one receiver serves.
/// Valid node addresses are `1..=MAX_NODES`.
pub const MAX_NODES: usize = 4;

/// Number of button pins per transmitter (one PCF8575 port expander).
pub const BUTTON_COUNT: usize = 16;

/// HID actions a single button binding can fire at once.
pub const ACTIONS_PER_BINDING: usize = 4;

/// Pin level that means "pressed" (buttons pull the expander pin low).
pub const PRESSED_LEVEL: bool = false;

/// Pins whose raw level is inverted before use (bit set = invert).
pub const PIN_INVERT_MASK: u16 = 0x0000;

/// Whether the receiver names nodes "TX<n>" when a request has no name.
pub const ALLOW_AUTO_NAMING: bool = true;

// Radio link

/// Broadcast destination address.
pub const BROADCAST_ADDRESS: u8 = 0xFF;

/// Address the receiver listens on.
pub const RECEIVER_ADDRESS: u8 = 0xFE;

/// Carrier frequency (Hz).
pub const RADIO_FREQUENCY_HZ: u32 = 915_000_000;

/// Transmit power (dBm). RFM69HCW modules accept -2..=20.
pub const RADIO_TX_POWER_DBM: i8 = 2;

/// The module is a high-power (H/HCW) variant.
pub const RADIO_HIGH_POWER: bool = true;

/// Shared AES-128 key for the link.
pub const RADIO_ENCRYPTION_KEY: [u8; 16] = *b"16ByteSecretKey!";

/// Interval between advertisements while a transmitter is unassigned (ms).
pub const ADVERTISE_INTERVAL_MS: u64 = 2_000;

/// How long a transmitter waits for an assignment ack/nack (ms).
pub const ASSIGN_TIMEOUT_MS: u64 = 1_000;

/// Silence after which a peer's link is considered down (ms).
pub const LINK_DOWN_MS: u64 = 5_000;

/// Interval between heartbeats from an assigned transmitter (ms). Must
/// stay well below [`LINK_DOWN_MS`] or held buttons are released.
pub const HEARTBEAT_INTERVAL_MS: u64 = LINK_DOWN_MS / 2;

// Airtime accounting

/// Number of transmissions remembered for duty-cycle accounting.
pub const AIRTIME_BUFFER_LEN: usize = 64;

/// Rolling window over which duty-cycle is computed (ms).
pub const AIRTIME_WINDOW_MS: u64 = 20_000;

// Identity

/// Name used when nothing is stored yet.
pub const DEFAULT_NODE_NAME: &str = "Default Node";

/// Address used when nothing is stored yet (0 = unassigned).
pub const DEFAULT_NODE_ADDRESS: u8 = 0;

/// Maximum entries kept in the persistent error log.
pub const ERROR_LOG_CAPACITY: usize = 10;

// USB

/// USB VID/PID - use the "pid.codes" open-source test VID.
/// Replace with your own allocated VID/PID for production.
pub const USB_VID: u16 = 0x1209;
pub const USB_PID: u16 = 0x0002;

/// USB device strings.
pub const USB_MANUFACTURER: &str = "rf2usb";
pub const USB_PRODUCT: &str = "Radio-to-USB HID Bridge";
pub const USB_SERIAL_NUMBER: &str = "000001";

/// USB HID polling interval (ms).
pub const USB_HID_POLL_MS: u8 = 1;

// UI

/// OLED I²C address.
pub const OLED_I2C_ADDRESS: u8 = 0x3C;

/// PCF8575 port expander I²C address.
pub const PCF8575_I2C_ADDRESS: u8 = 0x20;

/// Port expander poll interval (ms).
pub const PIN_POLL_MS: u64 = 50;

/// Display refresh interval (ms).
pub const DISPLAY_REFRESH_MS: u64 = 150;

/// How long a transient status message stays on screen (ms).
pub const MESSAGE_HOLD_MS: u64 = 1_500;

/// Core tick interval: HID repeat scheduling and flush (ms).
pub const CORE_TICK_MS: u64 = 5;

/// Hold time on the menu button before reassignment is offered (ms).
pub const LONG_PRESS_MS: u64 = 2_000;

/// Button debounce time (ms).
pub const BUTTON_DEBOUNCE_MS: u64 = 50;

// GPIO pin assignments (nRF52840 Feather-style board + RFM69HCW wing)
//
// These are logical names; the concrete `embassy_nrf::peripherals::*`
// are picked in `main.rs`.
//
//   RFM69 CS       → P0.06
//   RFM69 RESET    → P0.08
//   RFM69 DIO0     → P0.07
//   SPI SCK/MOSI/MISO → P0.14 / P0.13 / P0.15
//   I²C SDA / SCL  → P0.26 / P0.27
//   Menu button    → P0.24

// Flash storage

/// Flash page index where the identity/error-log map starts (4 KB pages).
pub const STORAGE_FLASH_PAGE_START: u32 = 252;

/// Number of flash pages reserved for the map.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 4;
