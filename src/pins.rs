//! Port B pins as `embedded-hal` digital pins, and a busy-wait delay.
use core::convert::Infallible;

use avr_device::attiny85::PORTB;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

/// Bus clock.
pub const SCL: u8 = 0;
/// Bus data.
pub const SDA: u8 = 1;
/// `PCINT2`, the wake input.
pub const WAKE: u8 = 2;
/// Light output.
pub const LIGHT: u8 = 3;

/// Nanoseconds of one iteration of the busy-wait loop at 250kHz (at least
/// four cycles of 4µs each).
const NS_PER_LOOP: u32 = 16_000;

fn port() -> &'static avr_device::attiny85::portb::RegisterBlock {
    // SAFETY: every pin only modifies its own bit, and the bit-wise updates
    // are never interrupted by code touching the same pin.
    unsafe { &*PORTB::ptr() }
}

/// Make the pin an input, optionally with the internal pull-up.
pub fn configure_input(bit: u8, pullup: bool) {
    let mask = 1 << bit;
    let port = port();
    // SAFETY: all bit patterns are valid for the port registers
    port.ddrb.modify(|r, w| unsafe { w.bits(r.bits() & !mask) });
    if pullup {
        port.portb.modify(|r, w| unsafe { w.bits(r.bits() | mask) });
    } else {
        port.portb.modify(|r, w| unsafe { w.bits(r.bits() & !mask) });
    }
}

/// Current level of a pin, `true` meaning high.
pub fn is_high(bit: u8) -> bool {
    port().pinb.read().bits() & (1 << bit) != 0
}

/// A pin emulating an open-drain output.
///
/// The output latch is kept low, so switching the pin to output pulls the
/// line low, and switching it back to input releases it to the pull-up.
pub struct OpenDrain<const BIT: u8>;

impl<const BIT: u8> OpenDrain<BIT> {
    /// Take the pin, starting released.
    pub fn new() -> Self {
        configure_input(BIT, false);
        Self
    }
}

impl<const BIT: u8> Default for OpenDrain<BIT> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const BIT: u8> ErrorType for OpenDrain<BIT> {
    type Error = Infallible;
}

impl<const BIT: u8> OutputPin for OpenDrain<BIT> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        // SAFETY: all bit patterns are valid for the port registers
        port()
            .ddrb
            .modify(|r, w| unsafe { w.bits(r.bits() | (1 << BIT)) });
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        // SAFETY: all bit patterns are valid for the port registers
        port()
            .ddrb
            .modify(|r, w| unsafe { w.bits(r.bits() & !(1 << BIT)) });
        Ok(())
    }
}

impl<const BIT: u8> InputPin for OpenDrain<BIT> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(is_high(BIT))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

/// A regular output pin.
pub struct PushPull<const BIT: u8>;

impl<const BIT: u8> PushPull<BIT> {
    /// Take the pin as an output, starting low.
    pub fn new() -> Self {
        let port = port();
        // SAFETY: all bit patterns are valid for the port registers
        port.portb
            .modify(|r, w| unsafe { w.bits(r.bits() & !(1 << BIT)) });
        port.ddrb
            .modify(|r, w| unsafe { w.bits(r.bits() | (1 << BIT)) });
        Self
    }
}

impl<const BIT: u8> Default for PushPull<BIT> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const BIT: u8> ErrorType for PushPull<BIT> {
    type Error = Infallible;
}

impl<const BIT: u8> OutputPin for PushPull<BIT> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        // SAFETY: all bit patterns are valid for the port registers
        port()
            .portb
            .modify(|r, w| unsafe { w.bits(r.bits() & !(1 << BIT)) });
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        // SAFETY: all bit patterns are valid for the port registers
        port()
            .portb
            .modify(|r, w| unsafe { w.bits(r.bits() | (1 << BIT)) });
        Ok(())
    }
}

/// Busy-wait delay. Tolerates being too slow, never too fast.
#[derive(Clone, Copy)]
pub struct CycleDelay;

impl DelayNs for CycleDelay {
    fn delay_ns(&mut self, ns: u32) {
        for _ in 0..ns.div_ceil(NS_PER_LOOP) {
            avr_device::asm::nop();
        }
    }
}
