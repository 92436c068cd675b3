//! The control loop deciding when to sleep, measure and switch the light.
//!
//! ```text
//!  START ──[sensor ok]──▶ SLEEP ◀──────────────────────┐
//!                           │                          │
//!                      [wake edge]                     │
//!                           ▼                          │
//!                         WAKE                       CLOSED
//!                  [dark] ╱    ╲ [bright]              ▲
//!                        ▼      ▼                      │
//!                 LOWLIGHT      HIGHLIGHT ──[close]────┤
//!                  (light on)   (light off)            │
//!                      └──────────[close]──────────────┘
//!
//!  Any sensor failure ──▶ Fatal (full restart)
//! ```
//!
//! The ambient light is sampled once per wake-up, so the ALS is powered for
//! as short as possible, while proximity is polled continuously as long as
//! the light decision stands. [`Config::recheck_light`] makes every poll
//! re-measure the light as well.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{error, info};

use crate::apds9930::{Apds9930, Enable};
use crate::bus::Bus;
use crate::config::{Config, WakeEdge};
use crate::error::{Error, Fatal, Result};
use crate::state::{RunState, RunStateCell};

/// Power management of the processor core.
pub trait LowPower {
    /// Set up the external wake interrupt.
    fn configure_wake(&mut self, edge: WakeEdge, pullup: bool);

    /// Suspend execution until the wake interrupt fires.
    ///
    /// Implementations must mask interrupts, check
    /// [`RunStateCell::is_sleeping`], and only commit to low-power mode if
    /// the state is still [`RunState::Sleep`], so that a wake-up arriving
    /// right before the commit is not lost. It may return without a wake-up,
    /// the control loop then simply sleeps again.
    fn power_down(&mut self, state: &RunStateCell);
}

/// The runtime state machine.
pub struct Runtime<'s, B, L, D, P> {
    sensor: Apds9930<B>,
    light: L,
    delay: D,
    power: P,
    state: &'s RunStateCell,
    config: Config,
}

impl<'s, B, L, D, P> Runtime<'s, B, L, D, P>
where
    B: Bus,
    L: OutputPin,
    D: DelayNs,
    P: LowPower,
{
    pub fn new(
        sensor: Apds9930<B>,
        light: L,
        delay: D,
        power: P,
        state: &'s RunStateCell,
        config: Config,
    ) -> Self {
        Self {
            sensor,
            light,
            delay,
            power,
            state,
            config,
        }
    }

    pub fn state(&self) -> RunState {
        self.state.get()
    }

    pub fn sensor(&self) -> &Apds9930<B> {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut Apds9930<B> {
        &mut self.sensor
    }

    pub fn light(&self) -> &L {
        &self.light
    }

    pub fn light_mut(&mut self) -> &mut L {
        &mut self.light
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    pub fn power(&self) -> &P {
        &self.power
    }

    /// Run the control loop until something fails.
    pub fn run(&mut self) -> Fatal {
        loop {
            if let Err(fatal) = self.step() {
                return fatal;
            }
        }
    }

    /// Perform the work of the current state and move on to the next one.
    pub fn step(&mut self) -> core::result::Result<RunState, Fatal> {
        let current = self.state.get();
        let outcome = match current {
            RunState::Start => self.start().map(Some),
            // the wake interrupt owns the way out of Sleep
            RunState::Sleep => self.sleep().map(|()| None),
            RunState::Wake => self.wake().map(Some),
            RunState::LowLight | RunState::HighLight => self.poll(current).map(Some),
            RunState::Closed => self.close().map(Some),
        };

        let next = match outcome {
            Ok(Some(next)) => {
                self.state.set(next);
                next
            }
            Ok(None) => self.state.get(),
            Err(cause) => {
                error!("runtime: {cause} in {current:?}, restarting");
                return Err(Fatal {
                    state: current,
                    cause,
                });
            }
        };
        if next != current {
            info!("runtime: {current:?} -> {next:?}");
        }
        Ok(next)
    }

    fn start(&mut self) -> Result<RunState> {
        self.light_off()?;
        self.power
            .configure_wake(self.config.wake_edge, self.config.wake_pullup);
        self.sensor.init(&self.config.device)?;
        Ok(RunState::Sleep)
    }

    fn sleep(&mut self) -> Result<()> {
        self.sensor.clear_proximity_interrupt()?;
        self.sensor
            .set_enable(Enable::PIEN | Enable::WEN | Enable::PEN | Enable::PON)?;
        self.power.power_down(self.state);
        Ok(())
    }

    fn wake(&mut self) -> Result<RunState> {
        self.sensor.set_enable(Enable::AEN | Enable::PON)?;
        self.delay.delay_ms(self.config.settle_delay_ms);
        self.measure_light()
    }

    fn poll(&mut self, current: RunState) -> Result<RunState> {
        if current == RunState::LowLight {
            self.light_on()?;
        }

        let mut enable = Enable::WEN | Enable::PEN | Enable::PON;
        if self.config.recheck_light {
            enable = enable | Enable::AEN;
        }
        self.sensor.set_enable(enable)?;
        self.delay.delay_ms(self.config.poll_delay_ms);

        if self.sensor.read_proximity()? > self.config.proximity_threshold {
            return Ok(RunState::Closed);
        }
        if self.config.recheck_light {
            self.measure_light()
        } else {
            Ok(current)
        }
    }

    fn close(&mut self) -> Result<RunState> {
        self.light_off()?;
        Ok(RunState::Sleep)
    }

    fn measure_light(&mut self) -> Result<RunState> {
        let light = self.sensor.read_ambient_light(self.config.light_threshold)?;
        if light < self.config.light_threshold {
            Ok(RunState::LowLight)
        } else {
            Ok(RunState::HighLight)
        }
    }

    fn light_on(&mut self) -> Result<()> {
        self.light.set_high().map_err(|_| Error::Output)
    }

    fn light_off(&mut self) -> Result<()> {
        self.light.set_low().map_err(|_| Error::Output)
    }
}
