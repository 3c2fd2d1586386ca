//! Drive abstraction
//!
//! Maps signed speeds onto dual-input H-bridge channels. Each channel has a
//! forward and a reverse PWM input; a positive speed drives the forward input,
//! a negative speed the reverse input, and zero releases both. A driver-wide
//! enable (standby) line gates every channel.
//!
//! # Output ordering
//!
//! Both inputs of a channel high at the same time is an invalid bridge state.
//! Every write lowers the input that must end up at zero before raising the
//! other one, so a direction change never passes through a both-high state.
//!
//! # Enable line
//!
//! The enable line is raised before the first non-zero duty is written and
//! dropped as soon as all channels are back at zero.
//!
//! # Write failures
//!
//! A failed duty write during a command stops the whole drive before the error
//! is returned. Stopping never gives up early: every output is written and the
//! first error is reported afterwards.

use embedded_hal::digital::{self, Error as _, OutputPin};
use embedded_hal::pwm::{self, Error as _, SetDutyCycle};

use crate::command::{Convention, MotionCommand};
use crate::config::AXIS_MAX;

/// Number of H-bridge channels on the driver
pub const CHANNEL_COUNT: usize = 2;

/// Motor driver channel selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelId {
    /// Throttle channel in the axis convention, motor 1 in the per-wheel one
    A,
    /// Steer channel in the axis convention, motor 2 in the per-wheel one
    B,
}

impl ChannelId {
    pub const ALL: [ChannelId; CHANNEL_COUNT] = [ChannelId::A, ChannelId::B];

    fn index(self) -> usize {
        match self {
            ChannelId::A => 0,
            ChannelId::B => 1,
        }
    }
}

/// Duty of the two inputs of one channel
///
/// At most one of the two is non-zero; both zero means stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelDutyState {
    pub forward: u16,
    pub reverse: u16,
}

impl ChannelDutyState {
    pub const STOPPED: Self = Self {
        forward: 0,
        reverse: 0,
    };

    /// Clamps `speed` to `[-max_duty, max_duty]` and selects the direction
    pub fn from_signed(speed: i32, max_duty: u16) -> Self {
        let limit = i32::from(max_duty);
        let speed = speed.clamp(-limit, limit);
        let magnitude = speed.unsigned_abs() as u16;

        match speed {
            s if s > 0 => Self {
                forward: magnitude,
                reverse: 0,
            },
            s if s < 0 => Self {
                forward: 0,
                reverse: magnitude,
            },
            _ => Self::STOPPED,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.forward == 0 && self.reverse == 0
    }

    /// Signed duty, positive forward
    pub fn signed(&self) -> i16 {
        self.forward as i16 - self.reverse as i16
    }
}

/// Scales a percent axis value to a signed duty
///
/// Rounds half away from zero, so `50` maps to `128` with a ceiling of `255`.
pub fn scale_axis(value: i32, max_duty: u16) -> i32 {
    let value = value.clamp(-AXIS_MAX, AXIS_MAX);
    let scaled = value * i32::from(max_duty);
    let half = AXIS_MAX / 2;

    if scaled >= 0 {
        (scaled + half) / AXIS_MAX
    } else {
        (scaled - half) / AXIS_MAX
    }
}

/// Hardware failure while driving the outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveError {
    /// A PWM input rejected the duty write
    Pwm(pwm::ErrorKind),
    /// The enable/standby line could not be driven
    Enable(digital::ErrorKind),
}

/// One H-bridge channel: a forward and a reverse PWM input
pub struct HBridgeChannel<P> {
    forward: P,
    reverse: P,
    state: ChannelDutyState,
}

impl<P: SetDutyCycle> HBridgeChannel<P> {
    /// Wraps the two inputs. Nothing is written until the controller takes over.
    pub fn new(forward: P, reverse: P) -> Self {
        Self {
            forward,
            reverse,
            state: ChannelDutyState::STOPPED,
        }
    }

    pub fn state(&self) -> ChannelDutyState {
        self.state
    }

    fn write(&mut self, target: ChannelDutyState, max_duty: u16) -> Result<(), DriveError> {
        // lower the side that ends at zero first
        if target.reverse == 0 {
            Self::write_input(&mut self.reverse, 0, max_duty)?;
            self.state.reverse = 0;
            Self::write_input(&mut self.forward, target.forward, max_duty)?;
            self.state.forward = target.forward;
        } else {
            Self::write_input(&mut self.forward, 0, max_duty)?;
            self.state.forward = 0;
            Self::write_input(&mut self.reverse, target.reverse, max_duty)?;
            self.state.reverse = target.reverse;
        }
        Ok(())
    }

    /// Zeroes both inputs, attempting each even if the other fails
    ///
    /// An input that rejected the write keeps its previous duty in the state so
    /// the channel still reads as active.
    fn release(&mut self, max_duty: u16) -> Result<(), DriveError> {
        let reverse = Self::write_input(&mut self.reverse, 0, max_duty);
        if reverse.is_ok() {
            self.state.reverse = 0;
        }
        let forward = Self::write_input(&mut self.forward, 0, max_duty);
        if forward.is_ok() {
            self.state.forward = 0;
        }
        reverse.and(forward)
    }

    fn write_input(input: &mut P, duty: u16, max_duty: u16) -> Result<(), DriveError> {
        input
            .set_duty_cycle_fraction(duty.min(max_duty), max_duty)
            .map_err(|e| DriveError::Pwm(e.kind()))
    }
}

/// Dual-channel drive with a shared enable line
///
/// Owns the outputs for the lifetime of the firmware. Out-of-range speeds are
/// clamped, never rejected.
pub struct DriveController<P, EN> {
    channels: [HBridgeChannel<P>; CHANNEL_COUNT],
    enable: EN,
    enabled: bool,
    max_duty: u16,
}

impl<P, EN> DriveController<P, EN>
where
    P: SetDutyCycle,
    EN: OutputPin,
{
    /// Takes over the outputs and forces them into the stopped, disabled state
    pub fn new(
        channel_a: HBridgeChannel<P>,
        channel_b: HBridgeChannel<P>,
        enable: EN,
        max_duty: u16,
    ) -> Result<Self, DriveError> {
        let mut controller = Self {
            channels: [channel_a, channel_b],
            enable,
            enabled: false,
            max_duty: max_duty.max(1),
        };
        controller.stop_all()?;
        Ok(controller)
    }

    pub fn max_duty(&self) -> u16 {
        self.max_duty
    }

    /// Drives one channel with a signed speed in duty units
    pub fn set_channel(&mut self, id: ChannelId, speed: i32) -> Result<ChannelDutyState, DriveError> {
        let target = ChannelDutyState::from_signed(speed, self.max_duty);
        self.write_targets(&[(id, target)])?;
        Ok(target)
    }

    /// Applies a motion command using its convention's channel mapping
    ///
    /// Per-wheel values pass straight through. Axis values are scaled from
    /// percent to duty and drive one channel each; the two axes are not mixed.
    pub fn apply(&mut self, command: &MotionCommand) -> Result<(), DriveError> {
        let (a, b) = match command.convention {
            Convention::PerWheel => (i32::from(command.channel_a), i32::from(command.channel_b)),
            Convention::Axis => (
                scale_axis(command.throttle().into(), self.max_duty),
                scale_axis(command.steer().into(), self.max_duty),
            ),
        };

        self.write_targets(&[
            (ChannelId::A, ChannelDutyState::from_signed(a, self.max_duty)),
            (ChannelId::B, ChannelDutyState::from_signed(b, self.max_duty)),
        ])
    }

    fn write_targets(&mut self, targets: &[(ChannelId, ChannelDutyState)]) -> Result<(), DriveError> {
        if targets.iter().any(|(_, target)| !target.is_stopped()) {
            self.set_enabled(true)?;
        }

        for (id, target) in targets {
            if let Err(e) = self.channels[id.index()].write(*target, self.max_duty) {
                error!("Drive write failed on {:?}: {:?}", id, e);
                // best effort; the original failure is the one reported
                let _ = self.stop_all();
                return Err(e);
            }
        }

        if !self.is_active() {
            self.set_enabled(false)?;
        }
        Ok(())
    }

    /// Drops the enable line and zeroes every channel
    ///
    /// The enable line is driven low unconditionally, even when it is already
    /// believed to be low. Every channel is zeroed even if the enable line or
    /// another channel fails; the first error is returned.
    pub fn stop_all(&mut self) -> Result<(), DriveError> {
        let mut result = self
            .enable
            .set_low()
            .map_err(|e| DriveError::Enable(e.kind()));
        self.enabled = false;

        for channel in self.channels.iter_mut() {
            result = result.and(channel.release(self.max_duty));
        }
        result
    }

    pub fn duty(&self, id: ChannelId) -> ChannelDutyState {
        self.channels[id.index()].state()
    }

    /// Last applied signed duty per channel
    pub fn targets(&self) -> [i16; CHANNEL_COUNT] {
        [
            self.duty(ChannelId::A).signed(),
            self.duty(ChannelId::B).signed(),
        ]
    }

    /// Whether any channel has a non-zero duty
    pub fn is_active(&self) -> bool {
        self.channels.iter().any(|c| !c.state().is_stopped())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), DriveError> {
        if self.enabled == enabled {
            return Ok(());
        }

        let result = if enabled {
            self.enable.set_high()
        } else {
            self.enable.set_low()
        };
        result.map_err(|e| DriveError::Enable(e.kind()))?;
        self.enabled = enabled;
        Ok(())
    }
}
