//! RFM69HCW packet radio over SPI.
//!
//! Variable-length packet mode, 250 kbps GFSK, CRC and AES-128 in
//! hardware. DIO0 signals `PacketSent` while transmitting and
//! `PayloadReady` while receiving. The frame goes into the FIFO as
//! `[len][payload]` with no extra header of its own.

use crate::config::{RADIO_ENCRYPTION_KEY, RADIO_FREQUENCY_HZ, RADIO_HIGH_POWER, RADIO_TX_POWER_DBM};
use crate::error::RadioError;
use crate::protocol::radio::{RadioLink, Received};
use defmt::{debug, info};
use embassy_time::{with_timeout, Duration, Instant, Timer};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::digital::Wait;
use embedded_hal_async::spi::{Operation, SpiDevice};

mod reg {
    pub const FIFO: u8 = 0x00;
    pub const OP_MODE: u8 = 0x01;
    pub const DATA_MODUL: u8 = 0x02;
    pub const BITRATE_MSB: u8 = 0x03;
    pub const FDEV_MSB: u8 = 0x05;
    pub const FRF_MSB: u8 = 0x07;
    pub const VERSION: u8 = 0x10;
    pub const PA_LEVEL: u8 = 0x11;
    pub const OCP: u8 = 0x13;
    pub const RX_BW: u8 = 0x19;
    pub const AFC_BW: u8 = 0x1A;
    pub const RSSI_VALUE: u8 = 0x24;
    pub const DIO_MAPPING1: u8 = 0x25;
    pub const IRQ_FLAGS1: u8 = 0x27;
    pub const PREAMBLE_MSB: u8 = 0x2C;
    pub const SYNC_CONFIG: u8 = 0x2E;
    pub const SYNC_VALUE1: u8 = 0x2F;
    pub const PACKET_CONFIG1: u8 = 0x37;
    pub const PAYLOAD_LENGTH: u8 = 0x38;
    pub const FIFO_THRESH: u8 = 0x3C;
    pub const PACKET_CONFIG2: u8 = 0x3D;
    pub const AES_KEY1: u8 = 0x3E;
    pub const TEST_PA1: u8 = 0x5A;
    pub const TEST_PA2: u8 = 0x5C;
    pub const TEST_DAGC: u8 = 0x6F;
}

const WRITE: u8 = 0x80;
const CHIP_VERSION: u8 = 0x24;
const MODE_READY: u8 = 0x80;

/// Largest payload the FIFO takes with AES enabled.
pub const MAX_PAYLOAD: usize = 64;

const TX_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Mode {
    Standby = 0x04,
    Tx = 0x0C,
    Rx = 0x10,
}

/// `Frf = f / Fstep`, `Fstep = 32 MHz / 2^19`.
const fn frf(frequency_hz: u32) -> u32 {
    ((frequency_hz as u64 * (1 << 19)) / 32_000_000) as u32
}

/// PA1 only up to +13 dBm, PA1+PA2 above; high-power boost from +18.
fn pa_level(dbm: i8, high_power: bool) -> (u8, bool) {
    if !high_power {
        let dbm = dbm.clamp(-18, 13);
        return (0x80 | ((dbm + 18) as u8 & 0x1F), false);
    }
    let dbm = dbm.clamp(-2, 20);
    match dbm {
        -2..=13 => (0x40 | ((dbm + 18) as u8 & 0x1F), false),
        14..=17 => (0x60 | ((dbm + 14) as u8 & 0x1F), false),
        _ => (0x60 | ((dbm + 11) as u8 & 0x1F), true),
    }
}

pub struct Rfm69<SPI, IRQ, RST> {
    spi: SPI,
    dio0: IRQ,
    reset: RST,
    mode: Option<Mode>,
    boost: bool,
    last_rssi: i16,
}

impl<SPI, IRQ, RST> Rfm69<SPI, IRQ, RST>
where
    SPI: SpiDevice,
    IRQ: Wait,
    RST: OutputPin,
{
    pub fn new(spi: SPI, dio0: IRQ, reset: RST) -> Self {
        Self {
            spi,
            dio0,
            reset,
            mode: None,
            boost: false,
            last_rssi: 0,
        }
    }

    /// Reset the chip and load the packet configuration.
    pub async fn init(&mut self) -> Result<(), RadioError> {
        self.reset.set_high().map_err(|_| RadioError::Bus)?;
        Timer::after_micros(100).await;
        self.reset.set_low().map_err(|_| RadioError::Bus)?;
        Timer::after_millis(5).await;

        let version = self.read(reg::VERSION).await?;
        if version != CHIP_VERSION {
            return Err(RadioError::NotDetected);
        }

        self.set_mode(Mode::Standby).await?;
        // packet mode, FSK, Gaussian BT 1.0
        self.write(reg::DATA_MODUL, 0x01).await?;
        // 250 kbps, 250 kHz deviation
        self.write_burst(reg::BITRATE_MSB, &[0x00, 0x80]).await?;
        self.write_burst(reg::FDEV_MSB, &[0x10, 0x00]).await?;
        self.write(reg::RX_BW, 0xE0).await?;
        self.write(reg::AFC_BW, 0xE0).await?;
        self.write_burst(reg::FRF_MSB, &frf(RADIO_FREQUENCY_HZ).to_be_bytes()[1..]).await?;
        self.write_burst(reg::PREAMBLE_MSB, &[0x00, 0x04]).await?;
        // sync on, two bytes
        self.write(reg::SYNC_CONFIG, 0x88).await?;
        self.write_burst(reg::SYNC_VALUE1, &[0x2D, 0xD4]).await?;
        // variable length, whitening, CRC on
        self.write(reg::PACKET_CONFIG1, 0xD0).await?;
        self.write(reg::PAYLOAD_LENGTH, MAX_PAYLOAD as u8).await?;
        self.write(reg::FIFO_THRESH, 0x8F).await?;
        self.write(reg::TEST_DAGC, 0x30).await?;
        self.write_burst(reg::AES_KEY1, &RADIO_ENCRYPTION_KEY).await?;
        // AES on, auto RX restart
        self.write(reg::PACKET_CONFIG2, 0x03).await?;

        let (level, boost) = pa_level(RADIO_TX_POWER_DBM, RADIO_HIGH_POWER);
        self.write(reg::PA_LEVEL, level).await?;
        self.boost = boost;

        info!(
            "RFM69 ready: {} Hz, {} dBm, PA {=u8:#x}",
            RADIO_FREQUENCY_HZ, RADIO_TX_POWER_DBM, level
        );
        Ok(())
    }

    async fn set_mode(&mut self, mode: Mode) -> Result<(), RadioError> {
        if self.mode == Some(mode) {
            return Ok(());
        }
        if self.boost {
            let tx = mode == Mode::Tx;
            self.write(reg::TEST_PA1, if tx { 0x5D } else { 0x55 }).await?;
            self.write(reg::TEST_PA2, if tx { 0x7C } else { 0x70 }).await?;
            self.write(reg::OCP, if tx { 0x0F } else { 0x1A }).await?;
        }
        self.write(reg::OP_MODE, mode as u8).await?;
        for _ in 0..100 {
            if self.read(reg::IRQ_FLAGS1).await? & MODE_READY != 0 {
                self.mode = Some(mode);
                return Ok(());
            }
            Timer::after_micros(50).await;
        }
        Err(RadioError::Timeout)
    }

    async fn read(&mut self, register: u8) -> Result<u8, RadioError> {
        let mut value = [0u8];
        self.spi
            .transaction(&mut [Operation::Write(&[register & !WRITE]), Operation::Read(&mut value)])
            .await
            .map_err(|_| RadioError::Bus)?;
        Ok(value[0])
    }

    async fn write(&mut self, register: u8, value: u8) -> Result<(), RadioError> {
        self.write_burst(register, &[value]).await
    }

    async fn write_burst(&mut self, register: u8, data: &[u8]) -> Result<(), RadioError> {
        self.spi
            .transaction(&mut [Operation::Write(&[register | WRITE]), Operation::Write(data)])
            .await
            .map_err(|_| RadioError::Bus)
    }

    async fn read_burst(&mut self, register: u8, data: &mut [u8]) -> Result<(), RadioError> {
        self.spi
            .transaction(&mut [Operation::Write(&[register & !WRITE]), Operation::Read(data)])
            .await
            .map_err(|_| RadioError::Bus)
    }
}

impl<SPI, IRQ, RST> RadioLink for Rfm69<SPI, IRQ, RST>
where
    SPI: SpiDevice,
    IRQ: Wait,
    RST: OutputPin,
{
    async fn send(&mut self, frame: &[u8]) -> Result<u32, RadioError> {
        if frame.len() > MAX_PAYLOAD {
            return Err(RadioError::FrameTooLong);
        }
        self.set_mode(Mode::Standby).await?;
        // DIO0 = PacketSent
        self.write(reg::DIO_MAPPING1, 0x00).await?;
        self.spi
            .transaction(&mut [
                Operation::Write(&[reg::FIFO | WRITE, frame.len() as u8]),
                Operation::Write(frame),
            ])
            .await
            .map_err(|_| RadioError::Bus)?;

        self.set_mode(Mode::Tx).await?;
        let started = Instant::now();
        let sent = with_timeout(TX_TIMEOUT, self.dio0.wait_for_high()).await;
        let airtime_us = started.elapsed().as_micros();
        self.set_mode(Mode::Standby).await?;

        match sent {
            Ok(Ok(())) => {
                debug!("RFM69 sent {} bytes in {} us", frame.len(), airtime_us);
                Ok(u32::try_from(airtime_us).unwrap_or(u32::MAX))
            }
            Ok(Err(_)) => Err(RadioError::Bus),
            Err(_) => Err(RadioError::Timeout),
        }
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<Received, RadioError> {
        // DIO0 = PayloadReady
        self.write(reg::DIO_MAPPING1, 0x40).await?;
        self.set_mode(Mode::Rx).await?;
        self.dio0.wait_for_high().await.map_err(|_| RadioError::Bus)?;

        let rssi = -i16::from(self.read(reg::RSSI_VALUE).await?) / 2;
        self.set_mode(Mode::Standby).await?;
        let len = usize::from(self.read(reg::FIFO).await?);
        if len > buf.len() || len > MAX_PAYLOAD {
            return Err(RadioError::FrameTooLong);
        }
        self.read_burst(reg::FIFO, &mut buf[..len]).await?;
        self.last_rssi = rssi;
        Ok(Received { len, rssi })
    }

    fn last_rssi(&self) -> i16 {
        self.last_rssi
    }
}
