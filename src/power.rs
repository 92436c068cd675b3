//! Power-reduction, sleeping and resetting.
//!
//! The AVR microcontroller enables most of its peripherals by default, which is
//! convenient, but draws a lot of unnecessary power. Therefore this module aims
//! to help with reducing the power consumption by powering down certain unused
//! peripherals or even the whole CPU core. The watchdog doubles as the wake-up
//! source of timed sleeps and as the reset of last resort.

// The accesses of the registers (reading/writing) is done via a shared (and
// thus immutable) reference, but logically, there are changes performed to
// those registers. Therefore the functions in this module will take mutable
// references, even if they would not need to by the borrow checker.
#![allow(clippy::needless_pass_by_ref_mut)]

use core::cell::Cell;

use autolight::config::WakeEdge;
use autolight::runtime::LowPower;
use autolight::state::RunStateCell;
use avr_device::attiny85::wdt::wdtcr::WDPL_A;
use avr_device::attiny85::{AC, CPU, EXINT, WDT};
use critical_section::Mutex;
use embedded_hal::delay::DelayNs;

use crate::pins;

pub fn divide_system_clock_by<const N: usize>(cpu: &mut CPU) {
    use avr_device::attiny85::cpu::clkpr::CLKPS_A;
    let prescaler = match N {
        1 => CLKPS_A::PRESCALER_1,
        2 => CLKPS_A::PRESCALER_2,
        4 => CLKPS_A::PRESCALER_4,
        8 => CLKPS_A::PRESCALER_8,
        16 => CLKPS_A::PRESCALER_16,
        32 => CLKPS_A::PRESCALER_32,
        64 => CLKPS_A::PRESCALER_64,
        128 => CLKPS_A::PRESCALER_128,
        256 => CLKPS_A::PRESCALER_256,
        x => panic!("Illegal system clock divider `{x}` (use one of 1, 2, 4, ..., 256)"),
    };

    cpu.clkpr.write(|w| w.clkpce().set_bit());
    cpu.clkpr.write(|w| w.clkps().variant(prescaler));
}

/// Turn off the ADC, timers, USI and the analog comparator. None of them is
/// needed, the bus is bit-banged and all delays are busy-waits or watchdog
/// sleeps.
pub fn disable_unused_peripherals(cpu: &mut CPU, ac: &mut AC) {
    ac.acsr.modify(|_, w| w.acd().set_bit());
    cpu.prr.write(|w| {
        w.pradc()
            .set_bit()
            .prusi()
            .set_bit()
            .prtim0()
            .set_bit()
            .prtim1()
            .set_bit()
    });
}

/// Stop a watchdog left running by a previous fatal reset.
///
/// The watchdog reset flag keeps the watchdog enabled, so it has to be
/// cleared before the timed sequence can switch the watchdog off.
pub fn disable_watchdog(cpu: &mut CPU, watchdog: &mut WDT) {
    // SAFETY: all-zero is the state of MCUSR after a power-on
    cpu.mcusr.write(|w| unsafe { w.bits(0) });
    watchdog
        .wdtcr
        .write(|w| w.wdce().set_bit().wde().set_bit());
    watchdog.wdtcr.reset();
}

/// Request a full restart through the watchdog and wait for it.
///
/// The shortest watchdog period (16ms) is armed in system reset mode and the
/// core spins with interrupts disabled until the reset hits.
pub fn restart() -> ! {
    // SAFETY: nothing runs after this, so there is no other user of the
    // watchdog left.
    let watchdog = unsafe { &*WDT::ptr() };
    avr_device::interrupt::disable();
    watchdog
        .wdtcr
        .write(|w| w.wdce().set_bit().wde().set_bit());
    watchdog
        .wdtcr
        .write(|w| w.wde().set_bit().wdpl().variant(WDPL_A::CYCLES_2K_512K));
    loop {
        avr_device::asm::nop();
    }
}

/// Withdraw the sleep-enable bit, so that a `sleep` instruction that is
/// about to execute becomes a no-op. Called from the wake interrupt.
pub fn cancel_power_down() {
    // SAFETY: only the sleep-enable bit is touched, and the interrupt cannot
    // be preempted.
    let cpu = unsafe { &*CPU::ptr() };
    cpu.mcucr.modify(|_r, w| w.se().clear_bit());
}

/// Edge of the wake input that counts as a wake-up, read by the pin change
/// interrupt.
static WAKE_EDGE: Mutex<Cell<WakeEdge>> = Mutex::new(Cell::new(WakeEdge::Falling));

/// The configured wake edge, for the pin change interrupt.
pub fn wake_edge() -> WakeEdge {
    critical_section::with(|cs| WAKE_EDGE.borrow(cs).get())
}

/// Power-down sleep, woken by the pin change interrupt of the wake input.
///
/// `INT0` cannot be used in edge mode here: its edge detection needs the I/O
/// clock, which is stopped in power-down. Pin change interrupts are detected
/// asynchronously.
pub struct PowerDown {
    cpu: CPU,
    exint: EXINT,
}

impl PowerDown {
    pub fn new(cpu: CPU, exint: EXINT) -> Self {
        cpu.mcucr.modify(|_r, w| w.sm().pdown());
        Self { cpu, exint }
    }
}

impl LowPower for PowerDown {
    fn configure_wake(&mut self, edge: WakeEdge, pullup: bool) {
        pins::configure_input(pins::WAKE, pullup);
        critical_section::with(|cs| WAKE_EDGE.borrow(cs).set(edge));

        self.exint.pcmsk.write(|w| w.pcint2().set_bit());
        // drop a change recorded while the pin was still being set up
        self.exint.gifr.write(|w| w.pcif().set_bit());
        self.exint.gimsk.modify(|_r, w| w.pcie().set_bit());
    }

    fn power_down(&mut self, state: &RunStateCell) {
        avr_device::interrupt::disable();
        // SAFETY: interrupts stay disabled until right before `sleep`
        let cs = unsafe { critical_section::CriticalSection::new() };
        if state.is_sleeping(cs) {
            self.cpu.mcucr.modify(|_r, w| w.se().set_bit());
            // SAFETY: `sei` delays interrupts for one instruction, so `sleep`
            // is always reached, and a pending pin change wakes it up right away.
            unsafe { avr_device::interrupt::enable() };
            avr_device::asm::sleep();
            self.cpu.mcucr.modify(|_r, w| w.se().clear_bit());
        } else {
            // SAFETY: this function is not called during `interrupt::free`
            unsafe { avr_device::interrupt::enable() };
        }
    }
}

/// Watchdog timeouts usable for sleeping, longest first.
const PERIODS: [(u32, WDPL_A); 8] = [
    (2000, WDPL_A::CYCLES_256K),
    (1000, WDPL_A::CYCLES_128K),
    (500, WDPL_A::CYCLES_64K),
    (250, WDPL_A::CYCLES_32K),
    (125, WDPL_A::CYCLES_16K),
    (64, WDPL_A::CYCLES_8K),
    (32, WDPL_A::CYCLES_4K_1024K),
    (16, WDPL_A::CYCLES_2K_512K),
];

/// Delay that powers the core down while waiting, woken by the watchdog
/// interrupt.
///
/// Millisecond delays are split into watchdog periods, anything shorter than
/// the shortest period is busy-waited.
pub struct WatchdogDelay(WDT);

impl WatchdogDelay {
    pub fn new(watchdog: WDT) -> Self {
        Self(watchdog)
    }

    fn sleep_for(&mut self, cycles: WDPL_A) {
        self.0
            .wdtcr
            .write(|w| w.wdie().set_bit().wdph().clear_bit().wdpl().variant(cycles));
        // SAFETY: interrupts may be taken, this is not called during
        // `interrupt::free`
        let cpu = unsafe { &*CPU::ptr() };
        cpu.mcucr.modify(|_r, w| w.se().set_bit());
        unsafe { avr_device::interrupt::enable() };
        avr_device::asm::sleep();
        cpu.mcucr.modify(|_r, w| w.se().clear_bit());
        self.0.wdtcr.reset();
    }
}

impl DelayNs for WatchdogDelay {
    fn delay_ns(&mut self, ns: u32) {
        pins::CycleDelay.delay_ns(ns);
    }

    fn delay_ms(&mut self, mut ms: u32) {
        for (period, cycles) in PERIODS {
            while ms >= period {
                self.sleep_for(cycles);
                ms -= period;
            }
        }
        pins::CycleDelay.delay_us(ms * 1000);
    }
}

#[allow(clippy::missing_const_for_fn)]
#[avr_device::interrupt(attiny85)]
fn WDT() {
    // deliberately empty, just used for waking up the device.
}
