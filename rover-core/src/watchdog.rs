//! Command freshness watchdog
//!
//! The only liveness guarantee against a silent or hung command source: if no
//! accepted command has been seen for longer than the timeout while a motor is
//! running, the drive is forced into the stopped, disabled state. The check is
//! purely time based and does not depend on the transport noticing anything.

use embassy_time::{Duration, Instant};
use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;

use crate::drive::{DriveController, DriveError};

/// Informational record of a forced stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StaleStop {
    /// Time since the last accepted command when the stop fired
    pub elapsed: Duration,
    /// Signed duties that were cut
    pub cut: [i16; 2],
}

pub struct CommandWatchdog {
    last_command_at: Instant,
    timeout: Duration,
}

impl CommandWatchdog {
    /// Starts the watchdog as if a command had been accepted at `now`
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            last_command_at: now,
            timeout,
        }
    }

    /// Records an accepted command received at `at`
    pub fn touch(&mut self, at: Instant) {
        // queued commands may be drained out of arrival order with the link events
        if at > self.last_command_at {
            self.last_command_at = at;
        }
    }

    pub fn last_command_at(&self) -> Instant {
        self.last_command_at
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_stale(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_command_at) > self.timeout
    }

    /// Stops the drive if the command stream went stale while a motor runs
    pub fn check_and_enforce<P, EN>(
        &self,
        now: Instant,
        drive: &mut DriveController<P, EN>,
    ) -> Result<Option<StaleStop>, DriveError>
    where
        P: SetDutyCycle,
        EN: OutputPin,
    {
        if !self.is_stale(now) || !drive.is_active() {
            return Ok(None);
        }

        let cut = drive.targets();
        drive.stop_all()?;

        let elapsed = now.saturating_duration_since(self.last_command_at);
        info!("Motors stopped due to command timeout");
        Ok(Some(StaleStop { elapsed, cut }))
    }
}
