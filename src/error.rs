//! Error types shared by the bus, the sensor driver and the runtime.

use core::fmt;

use crate::state::RunState;

/// The byte of a register access that was not acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Device address with the write direction bit.
    Address,
    /// Command byte carrying the register address.
    Register,
    /// Device address with the read direction bit, after the repeated start.
    ReadAddress,
    /// Data byte of a register write.
    Data,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address => write!(f, "address"),
            Self::Register => write!(f, "register"),
            Self::ReadAddress => write!(f, "read address"),
            Self::Data => write!(f, "data"),
        }
    }
}

/// Every fallible operation of the firmware core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The device answered a byte with a not-acknowledge.
    Nack(Stage),
    /// The identification register does not hold the expected part number.
    UnexpectedId(u8),
    /// The light output pin could not be driven.
    Output,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nack(stage) => write!(f, "no acknowledge on {stage} byte"),
            Self::UnexpectedId(id) => write!(f, "unexpected device id 0x{id:02x}"),
            Self::Output => write!(f, "light output failed"),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

/// An unrecoverable condition of the control loop.
///
/// The runtime never retries a failed sensor access. Whoever drives the
/// runtime has to restart the whole system (on the ATtiny85 this is a
/// watchdog reset), which re-runs the initialization from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fatal {
    /// State whose work failed.
    pub state: RunState,
    /// What went wrong.
    pub cause: Error,
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fatal in {:?}: {}", self.state, self.cause)
    }
}
