//! Automatic light switch driven by ambient light and proximity.
//!
//! This little project is a small controller, which switches a light once
//! something moves away from a sensor in a dark place (think of the light in a
//! cupboard: the door opens, it is dark inside, so the light goes on; the door
//! closes again, so the light goes off). Both the ambient light and the
//! proximity are measured by a single Avago APDS-9930 sensor, which is
//! connected over a two-wire bus.
//!
//! # Requirements
//! 1. run from a small battery for a long time, i.e. sleep almost always
//! 2. wake up only on the proximity interrupt of the sensor
//! 3. measure the ambient light only once per wake-up (the ALS draws power)
//! 4. never leave the bus or the sensor in a wedged state: if anything goes
//!    wrong, restart everything
//!
//! # Structure
//! The crate is split into the hardware independent core, which is tested on
//! the host, and the firmware binary for the ATtiny85 (feature `attiny85`):
//! - [`bus`]: software driven bus master on two open-drain lines
//! - [`apds9930`]: register access and measurements of the sensor
//! - [`runtime`]: the state machine of the control loop
//! - [`state`]: the run state shared with the wake interrupt
//! - [`config`]: thresholds, timings and sensor defaults
#![cfg_attr(not(test), no_std)]

pub mod apds9930;
pub mod bus;
pub mod config;
pub mod runtime;
pub mod state;

mod error;

pub use error::{Error, Fatal, Result, Stage};
