//! Mock hardware for integration tests.
//!
//! `SimulatedApds` decodes the byte stream of the bus like the real sensor
//! would and keeps its register file, so tests can assert on both the bus
//! traffic and the resulting device state.

// shared with the property tests, which only use part of it
#![allow(dead_code)]

use std::collections::VecDeque;

use autolight::apds9930::{self, reg, Apds9930};
use autolight::bus::{Ack, Bus};
use autolight::config::{Config, WakeEdge};
use autolight::runtime::{LowPower, Runtime};
use autolight::state::{self, RunStateCell};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};

// ── Bus events ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    Start,
    Stop,
    Write(u8, Ack),
    Read(u8, Ack),
}

// ── SimulatedApds ─────────────────────────────────────────────

pub struct SimulatedApds {
    pub registers: [u8; 0x20],
    pub events: Vec<BusEvent>,
    /// Device answers on the bus at all.
    pub present: bool,
    /// Refuse to acknowledge this byte value.
    pub nack_byte: Option<u8>,
    pub interrupt_latched: bool,
    pub interrupt_clears: usize,
    bytes_in_transfer: usize,
    reading: bool,
    pointer: u8,
}

impl SimulatedApds {
    pub fn new() -> Self {
        let mut registers = [0; 0x20];
        registers[usize::from(reg::ID)] = apds9930::PART_ID;
        Self {
            registers,
            events: Vec::new(),
            present: true,
            nack_byte: None,
            interrupt_latched: false,
            interrupt_clears: 0,
            bytes_in_transfer: 0,
            reading: false,
            pointer: 0,
        }
    }

    pub fn register(&self, register: u8) -> u8 {
        self.registers[usize::from(register)]
    }

    pub fn set_channels(&mut self, ch0: u16, ch1: u16) {
        self.set_word(reg::CH0DATAL, ch0);
        self.set_word(reg::CH1DATAL, ch1);
    }

    pub fn set_proximity(&mut self, proximity: u16) {
        self.set_word(reg::PDATAL, proximity);
    }

    fn set_word(&mut self, low: u8, value: u16) {
        let [l, h] = value.to_le_bytes();
        self.registers[usize::from(low)] = l;
        self.registers[usize::from(low) + 1] = h;
    }

    pub fn count(&self, event: BusEvent) -> usize {
        self.events.iter().filter(|e| **e == event).count()
    }

    pub fn starts(&self) -> usize {
        self.count(BusEvent::Start)
    }

    pub fn stops(&self) -> usize {
        self.count(BusEvent::Stop)
    }

    /// Every START has been closed by a STOP.
    pub fn is_idle(&self) -> bool {
        self.events.last().map_or(true, |e| *e == BusEvent::Stop)
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    fn accept(&mut self, byte: u8) -> Ack {
        if !self.present || self.nack_byte == Some(byte) {
            return Ack::Nack;
        }
        match self.bytes_in_transfer {
            0 => {
                if byte >> 1 != apds9930::ADDRESS {
                    return Ack::Nack;
                }
                self.reading = byte & 1 == 1;
            }
            1 if byte & 0xE0 == 0xE0 => {
                if byte == apds9930::CLEAR_PROXIMITY_INTERRUPT {
                    self.interrupt_latched = false;
                    self.interrupt_clears += 1;
                }
            }
            1 => self.pointer = byte & 0x1F,
            _ => {
                self.registers[usize::from(self.pointer)] = byte;
                self.pointer = (self.pointer + 1) & 0x1F;
            }
        }
        Ack::Ack
    }
}

impl Default for SimulatedApds {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimulatedApds {
    fn start(&mut self) {
        self.events.push(BusEvent::Start);
        self.bytes_in_transfer = 0;
        self.reading = false;
    }

    fn stop(&mut self) {
        self.events.push(BusEvent::Stop);
    }

    fn write_byte(&mut self, byte: u8) -> Ack {
        let ack = self.accept(byte);
        if ack == Ack::Ack {
            self.bytes_in_transfer += 1;
        }
        self.events.push(BusEvent::Write(byte, ack));
        ack
    }

    fn read_byte(&mut self, ack: Ack) -> u8 {
        let value = self.registers[usize::from(self.pointer)];
        self.pointer = (self.pointer + 1) & 0x1F;
        self.events.push(BusEvent::Read(value, ack));
        value
    }
}

// ── MockLight ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockLight {
    pub on: bool,
    pub switches: Vec<bool>,
    /// Every switch attempt fails.
    pub broken: bool,
}

impl MockLight {
    fn switch(&mut self, on: bool) -> Result<(), ErrorKind> {
        if self.broken {
            return Err(ErrorKind::Other);
        }
        self.on = on;
        self.switches.push(on);
        Ok(())
    }
}

impl ErrorType for MockLight {
    type Error = ErrorKind;
}

impl OutputPin for MockLight {
    fn set_low(&mut self) -> Result<(), ErrorKind> {
        self.switch(false)
    }

    fn set_high(&mut self) -> Result<(), ErrorKind> {
        self.switch(true)
    }
}

// ── RecordingDelay ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingDelay {
    pub delays_ms: Vec<u32>,
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, _ns: u32) {}

    fn delay_ms(&mut self, ms: u32) {
        self.delays_ms.push(ms);
    }
}

// ── ScriptedWake ──────────────────────────────────────────────

/// Low-power mock: every power-down consumes one entry of the script.
/// `Some(level)` is a pin change of the wake input leaving the line at
/// `level`, `None` a return without any change.
#[derive(Default)]
pub struct ScriptedWake {
    pub script: VecDeque<Option<bool>>,
    pub power_downs: usize,
    pub skipped: usize,
    pub wake_config: Option<(WakeEdge, bool)>,
}

impl ScriptedWake {
    /// `count` falling edges of the open-drain sensor output.
    pub fn waking(count: usize) -> Self {
        Self::with_changes(&vec![Some(false); count])
    }

    pub fn with_changes(changes: &[Option<bool>]) -> Self {
        Self {
            script: changes.iter().copied().collect(),
            ..Self::default()
        }
    }
}

impl LowPower for ScriptedWake {
    fn configure_wake(&mut self, edge: WakeEdge, pullup: bool) {
        self.wake_config = Some((edge, pullup));
    }

    fn power_down(&mut self, state: &RunStateCell) {
        let commit = critical_section::with(|cs| state.is_sleeping(cs));
        if !commit {
            self.skipped += 1;
            return;
        }
        self.power_downs += 1;
        if let Some(Some(line_high)) = self.script.pop_front() {
            let (edge, _) = self.wake_config.unwrap_or((WakeEdge::Falling, false));
            state::on_pin_change(state, edge, line_high, || {});
        }
    }
}

// ── Runtime fixture ───────────────────────────────────────────

pub type TestRuntime<'s> =
    Runtime<'s, SimulatedApds, MockLight, RecordingDelay, ScriptedWake>;

pub fn runtime<'s>(
    device: SimulatedApds,
    wake: ScriptedWake,
    state: &'s RunStateCell,
    config: Config,
) -> TestRuntime<'s> {
    Runtime::new(
        Apds9930::new(device),
        MockLight::default(),
        RecordingDelay::default(),
        wake,
        state,
        config,
    )
}
