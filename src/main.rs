//! Firmware of the automatic light switch for the ATtiny85.
//!
//! The hardware independent part lives in the library crate, this binary only
//! wires it up to the peripherals of the MCU.
//!
//! # MCU used
//! The ATtiny85 is clocked from its internal RC-oscillator, which is divided by
//! 32 (yielding a frequency of `8MHz/32=250kHz`). This is fast enough for the
//! bit-banged bus and keeps the active current low, but the MCU spends almost
//! all of its time in power-down mode anyway.
//! ```ascii-drawing
//!                                     ┌───╥───┐
//!        (PCINT5/~RESET/ADC0/dB) PB5 ━┥ 1   8 ┝━ VCC
//! (PCINT3/XTAL1/CLKI/~OC1B/ADC3) PB3 ━┥ 2   7 ┝━ PB2 (SCK/USCK/SCL/ADC1/T0/INT0/PCINT2)
//!  (PCINT4/XTAL2/CLKO/OC1B/ADC2) PB4 ━┥ 3   6 ┝━ PB1 (MISO/DO/AIN1/OC0B/OC1A/PCINT1)
//!                                GND ━┥ 4   5 ┝━ PB0 (MOSI/DI/SDA/AIN0/OC0A/~OC1A/AREF/PCINT0)
//!                                     └───────┘
//! ```
//! The USI is not used, the bus is bit-banged on any two pins:
//! - `PB0`: bus clock (open-drain emulated via the direction register)
//! - `PB1`: bus data (open-drain emulated via the direction register)
//! - `PB2`: `PCINT2`, connected to the (open-drain) interrupt output of the
//!   APDS-9930 (`INT0` on this pin cannot wake from power-down on an edge)
//! - `PB3`: light output, active high (drives the gate of a logic-level
//!   MOSFET)
//!
//! `PB5` stays the reset pin, so that ISP is still possible. Both bus lines
//! need external pull-up resistors.
#![no_std]
#![no_main]
#![feature(abi_avr_interrupt)]

use autolight::apds9930::Apds9930;
use autolight::bus::SoftI2c;
use autolight::config::Config;
use autolight::runtime::Runtime;
use autolight::state::{self, RunState, RunStateCell};

mod pins;
mod power;

/// Resolved once before the control loop starts.
const CONFIG: Config = Config::DEFAULT;

/// The run state, shared between the main loop and the pin change interrupt.
static RUN_STATE: RunStateCell = RunStateCell::new(RunState::Start);

#[avr_device::entry]
fn main() -> ! {
    // SAFETY: this is the first and only time, the peripherals are taken.
    // Normally, this would be done via the safe `take()`-function, but this
    // introduces a "possible panic" into the code with additional code being
    // generated. Therefore, this `unsafe`-function is used.
    let mut peripherals = unsafe { avr_device::attiny85::Peripherals::steal() };

    power::disable_watchdog(&mut peripherals.CPU, &mut peripherals.WDT);
    power::divide_system_clock_by::<32>(&mut peripherals.CPU); // 8MHz/32=250kHz
    power::disable_unused_peripherals(&mut peripherals.CPU, &mut peripherals.AC);

    let bus = SoftI2c::new(
        pins::OpenDrain::<{ pins::SCL }>::new(),
        pins::OpenDrain::<{ pins::SDA }>::new(),
        pins::CycleDelay,
        CONFIG.bus_delay_us,
    );
    let mut runtime = Runtime::new(
        Apds9930::new(bus),
        pins::PushPull::<{ pins::LIGHT }>::new(),
        power::WatchdogDelay::new(peripherals.WDT),
        power::PowerDown::new(peripherals.CPU, peripherals.EXINT),
        &RUN_STATE,
        CONFIG,
    );

    let _fatal = runtime.run();
    power::restart()
}

#[avr_device::interrupt(attiny85)]
fn PCINT0() {
    state::on_pin_change(
        &RUN_STATE,
        power::wake_edge(),
        pins::is_high(pins::WAKE),
        power::cancel_power_down,
    );
}

/// The panic handler of the application.
///
/// Normally, one would fill this panic handler with a reset, a flashing LED or
/// similar. But this project aims to avoid using panics altogether. Therefore
/// this panic handler should (in theory) not be necessary as it is never called
/// by Rust. But: the [`core`]-crate requires the function to be provided by a
/// `![no_std]`-binary. Therefore this function contains a body, that will not
/// compile (in reality: will not link) the application due to a missing symbol.
/// If there is any (potentially) reachable panic (i.e. one, that the optimizer
/// could not get rid of), an error like this is shown to the user:
/// ```console
/// src/main.rs:63:(.text.rust_begin_unwind+0x0): undefined reference to `a_panic_is_reachable'
/// ```
/// This indicates, that there is a possibly panicking call and shows even the
/// line number (63 in this case).
#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    extern "C" {
        fn a_panic_is_reachable() -> !;
    }
    // SAFETY: if this would be reachable, the code would not compile
    unsafe { a_panic_is_reachable() };
}
