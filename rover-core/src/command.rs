//! Command types shared by the parsers, the queue and the controller

use embassy_time::Instant;

/// How the two values of a motion command map onto the drive channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Convention {
    /// Tank-style: each value is a signed wheel speed in duty units
    PerWheel,
    /// Joystick axes in percent: channel A is throttle, channel B is steer
    Axis,
}

/// A motion request, values already clamped to the convention's range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionCommand {
    pub convention: Convention,
    pub channel_a: i16,
    pub channel_b: i16,
}

impl MotionCommand {
    pub fn per_wheel(m1: i32, m2: i32) -> Self {
        let limit = crate::config::WHEEL_SPEED_MAX;
        Self {
            convention: Convention::PerWheel,
            channel_a: m1.clamp(-limit, limit) as i16,
            channel_b: m2.clamp(-limit, limit) as i16,
        }
    }

    pub fn axis(steer: i32, throttle: i32) -> Self {
        let limit = crate::config::AXIS_MAX;
        Self {
            convention: Convention::Axis,
            channel_a: throttle.clamp(-limit, limit) as i16,
            channel_b: steer.clamp(-limit, limit) as i16,
        }
    }

    /// Steer axis value, only meaningful for [`Convention::Axis`]
    pub fn steer(&self) -> i16 {
        self.channel_b
    }

    /// Throttle axis value, only meaningful for [`Convention::Axis`]
    pub fn throttle(&self) -> i16 {
        self.channel_a
    }
}

/// Single character control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlCommand {
    /// `'A'`: switch to autonomous mode
    Auto,
    /// `'M'`: switch to manual mode
    Manual,
    /// `'S'`: emergency stop
    Stop,
}

impl ControlCommand {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'A' => Some(Self::Auto),
            b'M' => Some(Self::Manual),
            b'S' => Some(Self::Stop),
            _ => None,
        }
    }
}

/// A parsed inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Inbound {
    Control(ControlCommand),
    Motion(MotionCommand),
}

/// An accepted command stamped with its arrival time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
    pub inbound: Inbound,
    pub received_at: Instant,
}

/// Element of the control-event queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlEvent {
    /// A parsed message from the operator
    Command(Command),
    /// An operator client connected
    LinkUp,
    /// The operator client went away
    LinkDown,
}

impl ControlEvent {
    /// Motion commands are superseded by the next one; every other event must
    /// reach the drive task
    pub fn is_droppable(&self) -> bool {
        matches!(
            self,
            ControlEvent::Command(Command {
                inbound: Inbound::Motion(_),
                ..
            })
        )
    }
}
