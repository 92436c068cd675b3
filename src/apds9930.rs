//! Driver for the Avago APDS-9930 ambient light and proximity sensor.
//!
//! The driver only knows the handful of registers this firmware needs. All
//! accesses use the auto-increment command protocol, but measurement data is
//! always fetched one byte per transaction: reading the multi-byte channel
//! registers in one go with auto-increment does not return consistent data
//! on this part.

use core::ops::BitOr;

use log::{debug, info, trace};

use crate::bus::{Ack, Bus, Transaction};
use crate::config::DeviceConfig;
use crate::error::{Error, Result, Stage};

/// 7-bit bus address of the sensor.
pub const ADDRESS: u8 = 0x39;

/// Value of the [`reg::ID`] register of an APDS-9930.
pub const PART_ID: u8 = 0x39;

/// Register addresses.
pub mod reg {
    pub const ENABLE: u8 = 0x00;
    pub const ATIME: u8 = 0x01;
    pub const PTIME: u8 = 0x02;
    pub const WTIME: u8 = 0x03;
    pub const PILTL: u8 = 0x08;
    pub const PILTH: u8 = 0x09;
    pub const PIHTL: u8 = 0x0A;
    pub const PIHTH: u8 = 0x0B;
    pub const PERS: u8 = 0x0C;
    pub const CONFIG: u8 = 0x0D;
    pub const PPULSE: u8 = 0x0E;
    pub const CONTROL: u8 = 0x0F;
    pub const ID: u8 = 0x12;
    pub const CH0DATAL: u8 = 0x14;
    pub const CH0DATAH: u8 = 0x15;
    pub const CH1DATAL: u8 = 0x16;
    pub const CH1DATAH: u8 = 0x17;
    pub const PDATAL: u8 = 0x18;
    pub const PDATAH: u8 = 0x19;
}

/// Command bit plus the auto-increment transaction type.
pub const AUTO_INCREMENT: u8 = 0xA0;

/// Special function command clearing a latched proximity interrupt.
pub const CLEAR_PROXIMITY_INTERRUPT: u8 = 0xE5;

/// Contents of the ENABLE register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Enable(u8);

impl Enable {
    /// Power on.
    pub const PON: Self = Self(1 << 0);
    /// ALS enable.
    pub const AEN: Self = Self(1 << 1);
    /// Proximity enable.
    pub const PEN: Self = Self(1 << 2);
    /// Wait timer enable.
    pub const WEN: Self = Self(1 << 3);
    /// Proximity interrupt enable.
    pub const PIEN: Self = Self(1 << 5);

    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for Enable {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Raw readings of both ALS channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Channels {
    /// Visible and infrared.
    pub ch0: u16,
    /// Infrared only.
    pub ch1: u16,
}

impl Channels {
    /// Approximate the perceived brightness as `ch0 - 2 * ch1`.
    ///
    /// If the infrared part dominates, the result is `0`, unless `ch0` alone
    /// is above twice the light threshold: then the infrared channel is
    /// considered overflown and `ch0` is reported as is.
    pub fn ambient_light(self, light_threshold: u16) -> u16 {
        let ch0 = u32::from(self.ch0);
        let ir = 2 * u32::from(self.ch1);
        if ch0 >= ir {
            // never above ch0, so this always fits
            u16::try_from(ch0 - ir).unwrap_or(self.ch0)
        } else if ch0 > 2 * u32::from(light_threshold) {
            self.ch0
        } else {
            0
        }
    }
}

/// An APDS-9930 on a [`Bus`].
pub struct Apds9930<B> {
    bus: B,
}

impl<B: Bus> Apds9930<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn release(self) -> B {
        self.bus
    }

    /// Read a single register.
    ///
    /// This is a write of the register address, followed by a repeated start
    /// and a one-byte read that is not acknowledged, ending the transfer.
    pub fn read_register(&mut self, register: u8) -> Result<u8> {
        let mut tx = Transaction::begin(&mut self.bus);
        tx.write(ADDRESS << 1, Stage::Address)?;
        tx.write(register | AUTO_INCREMENT, Stage::Register)?;
        tx.restart();
        tx.write((ADDRESS << 1) | 1, Stage::ReadAddress)?;
        let value = tx.read(Ack::Nack);
        tx.end();
        trace!("apds: read 0x{register:02x} = 0x{value:02x}");
        Ok(value)
    }

    /// Write a single register.
    pub fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        let mut tx = Transaction::begin(&mut self.bus);
        tx.write(ADDRESS << 1, Stage::Address)?;
        tx.write(register | AUTO_INCREMENT, Stage::Register)?;
        tx.write(value, Stage::Data)?;
        tx.end();
        trace!("apds: write 0x{register:02x} = 0x{value:02x}");
        Ok(())
    }

    /// Clear a latched proximity interrupt, releasing the interrupt line.
    pub fn clear_proximity_interrupt(&mut self) -> Result<()> {
        let mut tx = Transaction::begin(&mut self.bus);
        tx.write(ADDRESS << 1, Stage::Address)?;
        tx.write(CLEAR_PROXIMITY_INTERRUPT, Stage::Register)?;
        tx.end();
        Ok(())
    }

    pub fn set_enable(&mut self, enable: Enable) -> Result<()> {
        self.write_register(reg::ENABLE, enable.bits())
    }

    /// Identify the sensor and program its registers.
    ///
    /// Afterwards the device runs proximity measurements with the wait timer
    /// in between. The ALS stays disabled until it is needed and the
    /// proximity interrupt is not yet enabled.
    pub fn init(&mut self, config: &DeviceConfig) -> Result<()> {
        let id = self.read_register(reg::ID)?;
        if id != PART_ID {
            return Err(Error::UnexpectedId(id));
        }

        // a latched interrupt may survive our own reset
        self.clear_proximity_interrupt()?;

        let [pilt_low, pilt_high] = config.proximity_low_threshold.to_le_bytes();
        let [piht_low, piht_high] = config.proximity_high_threshold.to_le_bytes();
        for (register, value) in [
            (reg::ATIME, config.als_time),
            (reg::PTIME, config.proximity_time),
            (reg::WTIME, config.wait_time),
            (reg::PPULSE, config.proximity_pulses),
            (reg::CONTROL, config.control),
            (reg::PILTL, pilt_low),
            (reg::PILTH, pilt_high),
            (reg::PIHTL, piht_low),
            (reg::PIHTH, piht_high),
            (reg::CONFIG, 0),
            (reg::PERS, config.persistence),
        ] {
            self.write_register(register, value)?;
        }
        self.set_enable(Enable::WEN | Enable::PEN | Enable::PON)?;

        info!("apds: part 0x{id:02x} initialized");
        Ok(())
    }

    /// Read a 16 bit data register pair, one byte per transaction.
    fn read_word(&mut self, low: u8, high: u8) -> Result<u16> {
        let low = self.read_register(low)?;
        let high = self.read_register(high)?;
        Ok(u16::from_le_bytes([low, high]))
    }

    pub fn read_channels(&mut self) -> Result<Channels> {
        let ch0 = self.read_word(reg::CH0DATAL, reg::CH0DATAH)?;
        let ch1 = self.read_word(reg::CH1DATAL, reg::CH1DATAH)?;
        Ok(Channels { ch0, ch1 })
    }

    /// Measure the ambient light, see [`Channels::ambient_light`].
    pub fn read_ambient_light(&mut self, light_threshold: u16) -> Result<u16> {
        let channels = self.read_channels()?;
        let light = channels.ambient_light(light_threshold);
        debug!(
            "apds: ch0={} ch1={} -> light={}",
            channels.ch0, channels.ch1, light
        );
        Ok(light)
    }

    pub fn read_proximity(&mut self) -> Result<u16> {
        let proximity = self.read_word(reg::PDATAL, reg::PDATAH)?;
        debug!("apds: proximity={proximity}");
        Ok(proximity)
    }
}
