//! USB device subsystem - presents a composite HID device to the host.
//!
//! The nRF52840's built-in USB 2.0 Full-Speed controller is driven by
//! `embassy-usb`. The composite device has three HID interfaces:
//!
//! - Interface 0: Keyboard (boot protocol)
//! - Interface 1: Mouse
//! - Interface 2: Gamepad (32 buttons)
//!
//! Every unmount (unplug, bus reset or suspend) bumps
//! [`hid_device::unmount_count`] so the receiver can drop every held key.
//! A resume after suspend mounts the device again.

pub mod hid_device;
