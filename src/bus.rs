//! Bit-banged two-wire bus master.
//!
//! The ATtiny85 has no usable TWI master for this, so both lines are driven
//! by software. A line is never actively driven high: "high" is produced by
//! releasing the line and letting the pull-up do its job, exactly like an
//! open-drain output. This is not optional, the device pulls the data line
//! low itself to acknowledge a byte.
//!
//! ```ascii-drawing
//!        START          bit 7   bit 6        ACK          STOP
//! SDA ‾‾‾╲___________╳‾‾‾‾‾‾‾╳_______╳ ··· ╳_______╱‾‾‾ ___╱‾‾‾‾
//! SCL ‾‾‾‾‾‾‾╲_______╱‾‾‾╲___╱‾‾‾╲___ ··· __╱‾‾‾╲___ ╱‾‾‾‾‾‾‾‾
//! ```

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::warn;

use crate::error::{Error, Result, Stage};

/// How many hold periods the master waits for a device stretching the clock.
const STRETCH_LIMIT: u8 = 32;

/// One line of the bus, seen as an open-drain output.
pub trait Line {
    /// Stop driving the line, so that it floats high.
    fn release(&mut self);

    /// Actively pull the line low.
    fn drive_low(&mut self);

    /// Sample the current line level, `true` meaning high.
    fn sample(&mut self) -> bool;
}

/// Every infallible pin usable as both input and output is a bus line, where
/// setting it high releases it.
impl<P> Line for P
where
    P: OutputPin<Error = Infallible> + InputPin,
{
    fn release(&mut self) {
        self.set_high().unwrap_or_else(|e| match e {});
    }

    fn drive_low(&mut self) {
        self.set_low().unwrap_or_else(|e| match e {});
    }

    fn sample(&mut self) -> bool {
        InputPin::is_high(self).unwrap_or_else(|e| match e {})
    }
}

/// The acknowledge bit following every byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// Data line held low: byte received, continue.
    Ack,
    /// Data line left high: error, or end of a read.
    Nack,
}

/// The four primitive operations of a bus master.
pub trait Bus {
    /// Generate a START condition. Also used for a repeated START.
    fn start(&mut self);

    /// Generate a STOP condition, leaving both lines released.
    fn stop(&mut self);

    /// Shift out one byte, most significant bit first, and return the
    /// acknowledge bit the device answered with.
    fn write_byte(&mut self, byte: u8) -> Ack;

    /// Shift in one byte and answer it with `ack`.
    fn read_byte(&mut self, ack: Ack) -> u8;
}

/// Software bus master on two [`Line`]s.
pub struct SoftI2c<SCL, SDA, D> {
    scl: SCL,
    sda: SDA,
    delay: D,
    hold_us: u32,
}

impl<SCL: Line, SDA: Line, D: DelayNs> SoftI2c<SCL, SDA, D> {
    /// Take over both lines and leave the bus idle. Every line transition is
    /// held for at least `hold_us` microseconds.
    pub fn new(scl: SCL, sda: SDA, delay: D, hold_us: u32) -> Self {
        let mut bus = Self {
            scl,
            sda,
            delay,
            hold_us,
        };
        bus.sda.release();
        bus.scl.release();
        bus.hold();
        bus
    }

    /// Give the lines and the delay back.
    pub fn release(self) -> (SCL, SDA, D) {
        (self.scl, self.sda, self.delay)
    }

    fn hold(&mut self) {
        self.delay.delay_us(self.hold_us);
    }

    /// Release the clock and wait until it actually reads high, since the
    /// device may stretch it.
    fn release_scl(&mut self) {
        self.scl.release();
        for _ in 0..STRETCH_LIMIT {
            if self.scl.sample() {
                break;
            }
            self.hold();
        }
        self.hold();
    }

    fn clock_pulse(&mut self) {
        self.release_scl();
        self.scl.drive_low();
        self.hold();
    }
}

impl<SCL: Line, SDA: Line, D: DelayNs> Bus for SoftI2c<SCL, SDA, D> {
    fn start(&mut self) {
        self.sda.release();
        self.hold();
        self.release_scl();
        self.sda.drive_low();
        self.hold();
        self.scl.drive_low();
        self.hold();
    }

    fn stop(&mut self) {
        self.sda.drive_low();
        self.hold();
        self.release_scl();
        self.sda.release();
        self.hold();
    }

    fn write_byte(&mut self, byte: u8) -> Ack {
        for bit in (0..8).rev() {
            if byte & (1 << bit) == 0 {
                self.sda.drive_low();
            } else {
                self.sda.release();
            }
            self.hold();
            self.clock_pulse();
        }

        self.sda.release();
        self.hold();
        self.release_scl();
        let ack = if self.sda.sample() { Ack::Nack } else { Ack::Ack };
        self.scl.drive_low();
        self.hold();
        ack
    }

    fn read_byte(&mut self, ack: Ack) -> u8 {
        self.sda.release();
        let mut byte = 0;
        for _ in 0..8 {
            self.release_scl();
            byte = (byte << 1) | u8::from(self.sda.sample());
            self.scl.drive_low();
            self.hold();
        }

        match ack {
            Ack::Ack => self.sda.drive_low(),
            Ack::Nack => self.sda.release(),
        }
        self.hold();
        self.clock_pulse();
        self.sda.release();
        byte
    }
}

/// A START..STOP bracket on a [`Bus`].
///
/// Creating the transaction issues the START, dropping it issues the STOP.
/// Returning early with `?` after a failed acknowledge therefore still
/// leaves the bus idle, and the STOP is sent exactly once.
pub struct Transaction<'a, B: Bus> {
    bus: &'a mut B,
}

impl<'a, B: Bus> Transaction<'a, B> {
    pub fn begin(bus: &'a mut B) -> Self {
        bus.start();
        Self { bus }
    }

    /// Write a byte, failing with the given stage if it is not acknowledged.
    pub fn write(&mut self, byte: u8, stage: Stage) -> Result<()> {
        match self.bus.write_byte(byte) {
            Ack::Ack => Ok(()),
            Ack::Nack => {
                warn!("bus: byte 0x{byte:02x} ({stage}) not acknowledged");
                Err(Error::Nack(stage))
            }
        }
    }

    /// Repeated START, keeping ownership of the bus.
    pub fn restart(&mut self) {
        self.bus.start();
    }

    pub fn read(&mut self, ack: Ack) -> u8 {
        self.bus.read_byte(ack)
    }

    /// End the transaction with a STOP.
    pub fn end(self) {}
}

impl<B: Bus> Drop for Transaction<'_, B> {
    fn drop(&mut self) {
        self.bus.stop();
    }
}
