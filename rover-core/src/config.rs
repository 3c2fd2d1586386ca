//! Tunables for the control core
//!
//! The constants are the values the firmware ships with. [`ControlConfig`] and
//! [`ConnectConfig`] carry them at runtime so tests can shrink the timings.

use embassy_time::Duration;

/// Duty ceiling of every H-bridge input (8-bit PWM resolution)
pub const MAX_DUTY: u16 = 255;

/// Magnitude limit of a per-wheel speed in the text variant
pub const WHEEL_SPEED_MAX: i32 = 255;

/// Magnitude limit of a steer/throttle axis in the structured variant
pub const AXIS_MAX: i32 = 100;

/// A command older than this stops the motors
pub const COMMAND_TIMEOUT: Duration = Duration::from_millis(300);

/// Upper bound for the network join at boot
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Link status poll period while joining
pub const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Grace period before restarting once the recovery image is selected
pub const RESTART_DELAY: Duration = Duration::from_millis(500);

/// Grace period before restarting when the recovery image could not be selected
pub const RESTART_DELAY_ON_ERROR: Duration = Duration::from_millis(2_000);

/// Longest inbound line accepted by the framer, terminator excluded
pub const MAX_LINE_LEN: usize = 128;

/// Runtime parameters of the drive and watchdog
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlConfig {
    /// Duty ceiling written to the PWM outputs
    pub max_duty: u16,
    /// Staleness threshold of the command watchdog
    pub command_timeout: Duration,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            max_duty: MAX_DUTY,
            command_timeout: COMMAND_TIMEOUT,
        }
    }
}

/// Runtime parameters of the boot-time network join
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub restart_delay: Duration,
    pub restart_delay_on_error: Duration,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            timeout: CONNECT_TIMEOUT,
            poll_interval: CONNECT_POLL_INTERVAL,
            restart_delay: RESTART_DELAY,
            restart_delay_on_error: RESTART_DELAY_ON_ERROR,
        }
    }
}
