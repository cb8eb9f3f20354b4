//! USB HID composite device: keyboard + mouse + gamepad.
//!
//! Initialises the Embassy USB stack on the nRF52840 USB peripheral and
//! exposes three HID endpoints. Reports reach the endpoint writers over
//! [`REPORT_CHANNEL`]; the receiver loop pushes into it through
//! [`ChannelTransport`].

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::config;
use crate::error::TransportError;
use crate::hid::gamepad::GAMEPAD_REPORT_DESCRIPTOR;
use crate::hid::keyboard::KEYBOARD_REPORT_DESCRIPTOR;
use crate::hid::mouse::MOUSE_REPORT_DESCRIPTOR;
use crate::hid::{HidReport, HidTransport};
use crate::usb_logic::MountState;
use defmt::{info, warn};
use embassy_nrf::usb::vbus_detect::HardwareVbusDetect;
use embassy_nrf::usb::Driver;
use embassy_nrf::{self, bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_usb::class::hid::{Config as HidConfig, HidWriter, State};
use embassy_usb::{Builder, Config, UsbDevice};
use static_cell::StaticCell;

bind_interrupts!(struct Irqs {
    USBD => embassy_nrf::usb::InterruptHandler<peripherals::USBD>;
    CLOCK_POWER => embassy_nrf::usb::vbus_detect::InterruptHandler;
});

/// Depth of the engine → USB queue.
pub const REPORT_QUEUE_DEPTH: usize = 16;

pub type UsbDriver = Driver<'static, peripherals::USBD, HardwareVbusDetect>;
pub type ReportChannel = Channel<CriticalSectionRawMutex, HidReport, REPORT_QUEUE_DEPTH>;

pub static REPORT_CHANNEL: ReportChannel = Channel::new();

static KB_STATE: StaticCell<State> = StaticCell::new();
static MOUSE_STATE: StaticCell<State> = StaticCell::new();
static GAMEPAD_STATE: StaticCell<State> = StaticCell::new();
static USB_CONFIG_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_BOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_MSOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_CTRL_BUF: StaticCell<[u8; 128]> = StaticCell::new();
static USB_MOUNT_HANDLER: StaticCell<UsbMountHandler> = StaticCell::new();

static USB_MOUNTED: AtomicBool = AtomicBool::new(false);
static USB_UNMOUNTS: AtomicU32 = AtomicU32::new(0);

struct UsbMountHandler {
    state: MountState,
}

impl UsbMountHandler {
    fn publish(&self, change: Option<bool>) {
        let Some(mounted) = change else {
            return;
        };
        info!("USB {}", if mounted { "mounted" } else { "unmounted" });
        USB_MOUNTED.store(mounted, Ordering::Relaxed);
        if !mounted {
            USB_UNMOUNTS.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl embassy_usb::Handler for UsbMountHandler {
    fn enabled(&mut self, enabled: bool) {
        let change = self.state.enabled(enabled);
        self.publish(change);
    }

    fn reset(&mut self) {
        let change = self.state.reset();
        self.publish(change);
    }

    fn configured(&mut self, configured: bool) {
        let change = self.state.configured(configured);
        self.publish(change);
    }

    fn suspended(&mut self, suspended: bool) {
        let change = self.state.suspended(suspended);
        self.publish(change);
    }
}

/// `true` while the host has the device configured and the bus is awake.
pub fn is_mounted() -> bool {
    USB_MOUNTED.load(Ordering::Relaxed)
}

/// Number of unmounts since boot. Feed it to an
/// [`UnmountWatch`](crate::usb_logic::UnmountWatch).
pub fn unmount_count() -> u32 {
    USB_UNMOUNTS.load(Ordering::Relaxed)
}

/// [`HidTransport`] that hands reports to the USB writer task.
///
/// Never waits: a full queue reads as not ready and the engine keeps its
/// reports dirty for the next flush.
pub struct ChannelTransport {
    sender: Sender<'static, CriticalSectionRawMutex, HidReport, REPORT_QUEUE_DEPTH>,
}

impl ChannelTransport {
    pub fn new(channel: &'static ReportChannel) -> Self {
        Self {
            sender: channel.sender(),
        }
    }
}

impl HidTransport for ChannelTransport {
    fn is_ready(&self) -> bool {
        is_mounted() && !self.sender.is_full()
    }

    fn send(&mut self, report: HidReport) -> Result<(), TransportError> {
        if !is_mounted() {
            return Err(TransportError::NotReady);
        }
        self.sender.try_send(report).map_err(|_| TransportError::Busy)
    }
}

/// Build result: the USB device runner and one writer per interface.
pub struct UsbHidDevice {
    pub device: UsbDevice<'static, UsbDriver>,
    pub keyboard_writer: HidWriter<'static, UsbDriver, 8>,
    pub mouse_writer: HidWriter<'static, UsbDriver, 8>,
    pub gamepad_writer: HidWriter<'static, UsbDriver, 8>,
}

/// Initialise the USB stack and create the composite HID device.
///
/// Must be called exactly once. All static buffers are consumed here.
pub fn init(usbd: peripherals::USBD) -> UsbHidDevice {
    let driver = Driver::new(usbd, Irqs, HardwareVbusDetect::new(Irqs));

    let mut usb_config = Config::new(config::USB_VID, config::USB_PID);
    usb_config.manufacturer = Some(config::USB_MANUFACTURER);
    usb_config.product = Some(config::USB_PRODUCT);
    usb_config.serial_number = Some(config::USB_SERIAL_NUMBER);
    usb_config.max_power = 100; // mA
    usb_config.max_packet_size_0 = 64;

    let mut builder = Builder::new(
        driver,
        usb_config,
        USB_CONFIG_DESC.init([0u8; 256]),
        USB_BOS_DESC.init([0u8; 256]),
        USB_MSOS_DESC.init([0u8; 256]),
        USB_CTRL_BUF.init([0u8; 128]),
    );
    builder.handler(USB_MOUNT_HANDLER.init(UsbMountHandler {
        state: MountState::new(),
    }));

    let keyboard_writer = HidWriter::new(
        &mut builder,
        KB_STATE.init(State::new()),
        hid_config(KEYBOARD_REPORT_DESCRIPTOR),
    );
    let mouse_writer = HidWriter::new(
        &mut builder,
        MOUSE_STATE.init(State::new()),
        hid_config(MOUSE_REPORT_DESCRIPTOR),
    );
    let gamepad_writer = HidWriter::new(
        &mut builder,
        GAMEPAD_STATE.init(State::new()),
        hid_config(GAMEPAD_REPORT_DESCRIPTOR),
    );

    let device = builder.build();
    info!("USB HID composite device initialised (keyboard + mouse + gamepad)");

    UsbHidDevice {
        device,
        keyboard_writer,
        mouse_writer,
        gamepad_writer,
    }
}

fn hid_config(report_descriptor: &'static [u8]) -> HidConfig<'static> {
    HidConfig {
        report_descriptor,
        request_handler: None,
        poll_ms: config::USB_HID_POLL_MS,
        max_packet_size: 8,
    }
}

/// Run the USB device stack; spawn as its own task.
pub async fn run_usb_device(mut device: UsbDevice<'static, UsbDriver>) -> ! {
    info!("USB device task started");
    device.run().await
}

/// Drain the report queue into the matching endpoint.
pub async fn hid_writer_task(
    mut keyboard: HidWriter<'static, UsbDriver, 8>,
    mut mouse: HidWriter<'static, UsbDriver, 8>,
    mut gamepad: HidWriter<'static, UsbDriver, 8>,
    reports: Receiver<'static, CriticalSectionRawMutex, HidReport, REPORT_QUEUE_DEPTH>,
) -> ! {
    info!("HID writer task started");

    let mut buf = [0u8; 8];

    loop {
        let report = reports.receive().await;
        let n = report.serialize(&mut buf);
        let result = match report {
            HidReport::Keyboard(_) => keyboard.write(&buf[..n]).await,
            HidReport::Mouse(_) => mouse.write(&buf[..n]).await,
            HidReport::Gamepad(_) => gamepad.write(&buf[..n]).await,
        };
        if result.is_err() {
            warn!("USB {} write failed", report_kind(&report));
        }
    }
}

fn report_kind(report: &HidReport) -> &'static str {
    match report {
        HidReport::Keyboard(_) => "keyboard",
        HidReport::Mouse(_) => "mouse",
        HidReport::Gamepad(_) => "gamepad",
    }
}
