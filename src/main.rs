//! rf2usb firmware entry point.
//!
//! One image for both roles. At boot the board probes for the PCF8575
//! button expander: a board that has one is a transmitter, a board without
//! one is the receiver and enumerates as a USB HID composite device.

#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::{info, unwrap, warn};
use defmt_rtt as _;
use embassy_embedded_hal::adapter::BlockingAsync;
use embassy_embedded_hal::shared_bus::asynch::spi::SpiDevice;
use embassy_embedded_hal::shared_bus::blocking::i2c::I2cDevice;
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_nrf::gpio::{Input, Level, Output, OutputDrive, Pin, Pull};
use embassy_nrf::nvmc::Nvmc;
use embassy_nrf::peripherals::{SPI3, TWISPI0};
use embassy_nrf::rng::Rng;
use embassy_nrf::spim::{self, Spim};
use embassy_nrf::twim::{self, Twim};
use embassy_nrf::{bind_interrupts, peripherals, rng};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Instant, Ticker};
use embassy_usb::class::hid::HidWriter;
use embassy_usb::UsbDevice;
use log::LevelFilter;
use panic_probe as _;
use static_cell::StaticCell;

use rf2usb::config::{CORE_TICK_MS, DISPLAY_REFRESH_MS, MAX_NODES, PIN_POLL_MS};
use rf2usb::drivers::{Pcf8575, Rfm69};
use rf2usb::hid::default_bindings;
use rf2usb::link::LinkState;
use rf2usb::node::{Role, RxNode, TxNode};
use rf2usb::pins::PinDelta;
use rf2usb::protocol::{Fingerprint, Frame, RadioLink, TxMode};
use rf2usb::storage::flash::FlashStore;
use rf2usb::ui::buttons::MenuButton;
use rf2usb::ui::display::{self, Display};
use rf2usb::ui::input_logic::MenuEvent;
use rf2usb::ui::{self as screens, Line, MessageHold, Screen};
use rf2usb::usb::hid_device::{self, ChannelTransport, UsbDriver, REPORT_CHANNEL};
use rf2usb::usb_logic::UnmountWatch;

bind_interrupts!(struct Irqs {
    SPIM3 => spim::InterruptHandler<SPI3>;
    TWISPI0 => twim::InterruptHandler<TWISPI0>;
    RNG => rng::InterruptHandler<peripherals::RNG>;
});

type SpiBus = Mutex<NoopRawMutex, Spim<'static, SPI3>>;
type I2cBus = BlockingMutex<NoopRawMutex, RefCell<Twim<'static, TWISPI0>>>;
type I2c = I2cDevice<'static, NoopRawMutex, Twim<'static, TWISPI0>>;
type Radio = Rfm69<SpiDevice<'static, NoopRawMutex, Spim<'static, SPI3>, Output<'static>>, Input<'static>, Output<'static>>;
type Flash = FlashStore<BlockingAsync<Nvmc<'static>>>;

static SPI_BUS: StaticCell<SpiBus> = StaticCell::new();
static I2C_BUS: StaticCell<I2cBus> = StaticCell::new();

fn now_ms() -> u64 {
    Instant::now().as_millis()
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_nrf::init(Default::default());
    rf2usb::logging::init(LevelFilter::Debug);
    info!("rf2usb starting");

    // I²C: OLED and (on transmitters) the button expander
    let twim = Twim::new(p.TWISPI0, Irqs, p.P0_26, p.P0_27, twim::Config::default());
    let i2c_bus: &'static I2cBus = I2C_BUS.init(BlockingMutex::new(RefCell::new(twim)));

    let mut expander = Pcf8575::new(I2cDevice::new(i2c_bus));
    let role = match expander.probe() {
        Ok(()) => Role::Tx,
        Err(_) => Role::Rx,
    };
    info!("Role: {}", role);

    // Radio on SPIM3
    let mut spi_config = spim::Config::default();
    spi_config.frequency = spim::Frequency::M8;
    let spim = Spim::new(p.SPI3, Irqs, p.P0_14, p.P0_15, p.P0_13, spi_config);
    let spi_bus: &'static SpiBus = SPI_BUS.init(Mutex::new(spim));
    let cs = Output::new(p.P0_06, Level::High, OutputDrive::Standard);
    let spi = SpiDevice::new(spi_bus, cs);
    let dio0 = Input::new(p.P0_07, Pull::None);
    let reset = Output::new(p.P0_08, Level::Low, OutputDrive::Standard);
    let mut radio = Rfm69::new(spi, dio0, reset);
    if let Err(e) = radio.init().await {
        // keep running so the screen and USB still come up
        warn!("Radio init failed: {}", e);
    }

    let store = FlashStore::mount(BlockingAsync::new(Nvmc::new(p.NVMC)), now_ms()).await;
    let oled = display::init(I2cDevice::new(i2c_bus));

    match role {
        Role::Tx => {
            let fingerprint = Fingerprint::generate(&mut Rng::new(p.RNG, Irqs));
            let node = TxNode::start(radio, store, fingerprint, now_ms()).await;
            let button = MenuButton::new(p.P0_24.degrade());
            unwrap!(spawner.spawn(tx_task(node, expander, button, oled)));
        }
        Role::Rx => {
            let usb = hid_device::init(p.USBD);
            unwrap!(spawner.spawn(usb_task(usb.device)));
            unwrap!(spawner.spawn(hid_writer_task(
                usb.keyboard_writer,
                usb.mouse_writer,
                usb.gamepad_writer,
            )));
            let node = RxNode::start(radio, store, default_bindings(), now_ms()).await;
            unwrap!(spawner.spawn(rx_task(node, oled)));
        }
    }
}

#[embassy_executor::task]
async fn usb_task(device: UsbDevice<'static, UsbDriver>) -> ! {
    hid_device::run_usb_device(device).await
}

#[embassy_executor::task]
async fn hid_writer_task(
    keyboard: HidWriter<'static, UsbDriver, 8>,
    mouse: HidWriter<'static, UsbDriver, 8>,
    gamepad: HidWriter<'static, UsbDriver, 8>,
) -> ! {
    hid_device::hid_writer_task(keyboard, mouse, gamepad, REPORT_CHANNEL.receiver()).await
}

/// Transmitter loop: radio replies, expander polling, menu button, screen.
#[embassy_executor::task]
async fn tx_task(
    mut node: TxNode<Radio, Flash>,
    mut expander: Pcf8575<I2c>,
    mut button: MenuButton,
    mut oled: Display<I2c>,
) -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(CORE_TICK_MS));
    let mut buf = [0u8; 64];
    let mut screen = Screen::Home;
    let mut message = MessageHold::new();
    let mut last_delta: Option<PinDelta> = None;
    let mut next_pin_poll = 0u64;
    let mut next_refresh = 0u64;

    loop {
        match select(node.radio_mut().receive(&mut buf), ticker.next()).await {
            Either::First(Ok(rx)) => match Frame::decode(&buf[..rx.len]) {
                Ok(frame) => {
                    if let Some(event) = node.on_frame(&frame, now_ms()).await {
                        message.show(screens::assignment_message(&event), now_ms());
                        screen = Screen::Message;
                    }
                }
                Err(e) => warn!("Dropped frame: {}", e),
            },
            Either::First(Err(e)) => warn!("Radio receive failed: {}", e),
            Either::Second(()) => {
                let now = now_ms();

                if now >= next_pin_poll {
                    next_pin_poll = now + PIN_POLL_MS;
                    match expander.read() {
                        Ok(raw) => match node.on_pins(raw, now).await {
                            Ok(delta) if !delta.is_empty() => last_delta = Some(delta),
                            Ok(_) => {}
                            Err(e) => warn!("Pin send failed: {}", e),
                        },
                        Err(_) => warn!("Expander read failed"),
                    }
                }

                match button.poll(now, node.identity().address) {
                    Some(MenuEvent::Preview(target)) => screen = Screen::Preview(target),
                    Some(MenuEvent::Commit(target)) => {
                        node.request_address(target);
                        screen = Screen::Home;
                    }
                    None => {}
                }

                match node.poll(now).await {
                    Ok(Some(event)) => {
                        message.show(screens::assignment_message(&event), now);
                        screen = Screen::Message;
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Radio send failed: {}", e),
                }

                if now >= next_refresh {
                    next_refresh = now + DISPLAY_REFRESH_MS;
                    draw_tx(&mut oled, &mut node, &mut screen, &mut message, last_delta.as_ref(), now);
                }
            }
        }
    }
}

fn draw_tx(
    oled: &mut Display<I2c>,
    node: &mut TxNode<Radio, Flash>,
    screen: &mut Screen,
    message: &mut MessageHold,
    last_delta: Option<&PinDelta>,
    now: u64,
) {
    match *screen {
        Screen::Preview(target) => display::draw_preview(oled, target),
        Screen::Message => match message.current(now) {
            Some(text) => display::draw_message(oled, text),
            None => *screen = Screen::Home,
        },
        Screen::Home => {}
    }
    if *screen != Screen::Home {
        return;
    }
    let mode = node.client().mode();
    let address = match mode {
        TxMode::Assigned => node.identity().address,
        _ => 0,
    };
    let identity = screens::tx_identity_line(address, node.identity().name.as_str(), mode);
    let seq = node.link().seq();
    let activity = screens::tx_activity_line(seq, last_delta);
    let stats = node.link().airtime().stats(now);
    let air = screens::airtime_line(&stats);
    display::draw_rows(oled, &[identity.as_str(), activity.as_str(), air.as_str()]);
}

/// Receiver loop: radio frames, HID scheduling and flush, USB mount, screen.
#[embassy_executor::task]
async fn rx_task(mut node: RxNode<Radio, Flash>, mut oled: Display<I2c>) -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(CORE_TICK_MS));
    let mut transport = ChannelTransport::new(&REPORT_CHANNEL);
    let mut buf = [0u8; 64];
    let mut last_event = Line::new();
    let mut next_refresh = 0u64;
    let mut unmounts = UnmountWatch::new();

    loop {
        match select(node.radio_mut().receive(&mut buf), ticker.next()).await {
            Either::First(Ok(rx)) => match Frame::decode(&buf[..rx.len]) {
                Ok(frame) => match node.on_frame(&frame, rx.rssi, now_ms()).await {
                    Ok(Some(event)) => last_event = screens::rx_event_line(&event),
                    Ok(None) => {}
                    Err(e) => warn!("Reply failed: {}", e),
                },
                Err(e) => warn!("Dropped frame: {}", e),
            },
            Either::First(Err(e)) => warn!("Radio receive failed: {}", e),
            Either::Second(()) => {
                let now = now_ms();

                if unmounts.check(hid_device::unmount_count()) {
                    node.usb_unmounted();
                }
                for (address, state) in node.poll(now) {
                    info!("TX{} link {}", address, state);
                }
                node.flush(&mut transport);

                if now >= next_refresh {
                    next_refresh = now + DISPLAY_REFRESH_MS;
                    let mut links = [(LinkState::Down, 0i16); MAX_NODES];
                    for (slot, address) in links.iter_mut().zip(1u8..) {
                        let rssi = node.registry().holder_of(address).map_or(0, |e| e.last_rssi);
                        *slot = (node.link_state(address), rssi);
                    }
                    let [top, bottom] = screens::rx_link_lines(&links);
                    display::draw_rows(&mut oled, &[top.as_str(), bottom.as_str(), last_event.as_str()]);
                }
            }
        }
    }
}
