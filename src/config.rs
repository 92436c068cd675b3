//! Startup configuration: thresholds, timings and sensor register defaults.
//!
//! Everything in here is resolved once before the control loop starts and
//! never changes afterwards.

/// Proximity count above which something is considered close.
pub const PROXIMITY_THRESHOLD: u16 = 30;

/// Derived ambient-light value below which it is considered dark.
pub const LIGHT_THRESHOLD: u16 = 100;

/// Edge of the wake input that triggers the interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeEdge {
    Falling,
    Rising,
}

impl WakeEdge {
    /// Whether a line now at `line_high` has just seen this edge, given that
    /// it changed at all.
    pub const fn reached(self, line_high: bool) -> bool {
        match self {
            Self::Falling => !line_high,
            Self::Rising => line_high,
        }
    }
}

/// Register values programmed into the sensor during initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// ALS integration time (`0xED`: 19 cycles, ~52ms).
    pub als_time: u8,
    /// Proximity integration time (`0xFF`: 1 cycle, the recommended value).
    pub proximity_time: u8,
    /// Wait time between cycles (`0xB6`: ~202ms).
    pub wait_time: u8,
    /// Number of proximity LED pulses.
    pub proximity_pulses: u8,
    /// Control register: LED drive strength, proximity diode and gains.
    pub control: u8,
    /// Interrupt persistence filter.
    pub persistence: u8,
    /// Proximity interrupt low threshold.
    pub proximity_low_threshold: u16,
    /// Proximity interrupt high threshold, `0` disables it.
    pub proximity_high_threshold: u16,
}

impl DeviceConfig {
    /// 25mA LED drive.
    pub const PDRIVE_25MA: u8 = 0b1000_0000;
    /// Proximity measured on the channel-1 diode.
    pub const PDIODE_CH1: u8 = 0b0010_0000;
    /// 1x proximity gain.
    pub const PGAIN_1X: u8 = 0b0000_0000;
    /// 8x ALS gain.
    pub const AGAIN_8X: u8 = 0b0000_0001;

    pub const DEFAULT: Self = Self {
        als_time: 0xED,
        proximity_time: 0xFF,
        wait_time: 0xB6,
        proximity_pulses: 4,
        control: Self::PDRIVE_25MA | Self::PDIODE_CH1 | Self::PGAIN_1X | Self::AGAIN_8X,
        // three consecutive proximity values out of range
        persistence: 0b0011_0000,
        proximity_low_threshold: PROXIMITY_THRESHOLD,
        proximity_high_threshold: 0,
    };
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Configuration of the whole control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// A proximity reading above this value closes the light.
    pub proximity_threshold: u16,
    /// An ambient-light value below this value turns the light on.
    pub light_threshold: u16,
    /// Time to let the ALS integrate after it was enabled on wake-up.
    pub settle_delay_ms: u32,
    /// Time between two proximity polls while the light decision stands.
    pub poll_delay_ms: u32,
    /// Re-measure the ambient light on every poll instead of only on wake-up.
    pub recheck_light: bool,
    /// Edge of the wake input that fires the interrupt.
    pub wake_edge: WakeEdge,
    /// Enable the internal pull-up on the wake input.
    pub wake_pullup: bool,
    /// Minimum hold time of every bus line transition.
    pub bus_delay_us: u32,
    /// Sensor register defaults.
    pub device: DeviceConfig,
}

impl Config {
    pub const DEFAULT: Self = Self {
        proximity_threshold: PROXIMITY_THRESHOLD,
        light_threshold: LIGHT_THRESHOLD,
        settle_delay_ms: 600,
        poll_delay_ms: 600,
        recheck_light: false,
        wake_edge: WakeEdge::Falling,
        wake_pullup: false,
        bus_delay_us: 5,
        device: DeviceConfig::DEFAULT,
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}
