//! Status echo sent back to the client after a structured motion command

use core::fmt::Write as _;

use heapless::String;
use serde::Serialize;

use crate::command::MotionCommand;
use crate::control::DriveMode;

/// Capacity of the human readable `debug` field
pub const DEBUG_CAPACITY: usize = 64;
/// Capacity of one serialized echo, without the line terminator
pub const ECHO_CAPACITY: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEcho {
    /// Signed duty of channel A
    #[serde(rename = "motorA")]
    pub motor_a: i16,
    /// Signed duty of channel B
    #[serde(rename = "motorB")]
    pub motor_b: i16,
    pub debug: String<DEBUG_CAPACITY>,
}

impl StatusEcho {
    pub fn new(command: &MotionCommand, duties: [i16; 2], mode: DriveMode) -> Self {
        let mut debug = String::new();
        // longest possible rendering fits DEBUG_CAPACITY
        let _ = write!(
            debug,
            "JSTK_Raw:{}/{} | DutyA:{}/DutyB:{} | Mode:{}",
            command.throttle(),
            command.steer(),
            duties[0],
            duties[1],
            mode.as_str(),
        );

        Self {
            motor_a: duties[0],
            motor_b: duties[1],
            debug,
        }
    }

    pub fn to_json(&self) -> Result<String<ECHO_CAPACITY>, serde_json_core::ser::Error> {
        serde_json_core::to_string(self)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for StatusEcho {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "StatusEcho {{ motorA: {}, motorB: {}, debug: {} }}",
            self.motor_a,
            self.motor_b,
            self.debug.as_str()
        )
    }
}
