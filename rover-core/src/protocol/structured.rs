//! Structured variant: single control characters and JSON axis payloads

use serde::Deserialize;

use crate::command::{ControlCommand, MotionCommand};

/// `{"steer":int,"throttle":int,"t":timestamp}`; absent axes are zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct AxisPayload {
    pub steer: i32,
    pub throttle: i32,
    /// Sender timestamp, carried for tracing only
    pub t: Option<u64>,
}

impl AxisPayload {
    pub fn to_command(self) -> MotionCommand {
        MotionCommand::axis(self.steer, self.throttle)
    }
}

/// Why a structured message was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StructuredError {
    UnknownControl(u8),
    MalformedJson,
}

pub fn parse_control(byte: u8) -> Result<ControlCommand, StructuredError> {
    ControlCommand::from_byte(byte).ok_or(StructuredError::UnknownControl(byte))
}

pub fn parse_json(input: &str) -> Result<AxisPayload, StructuredError> {
    match serde_json_core::from_str::<AxisPayload>(input) {
        Ok((payload, _)) => Ok(payload),
        Err(_) => {
            warn!("JSON parse failed");
            Err(StructuredError::MalformedJson)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Convention;

    #[test]
    fn full_payload() {
        let payload = parse_json(r#"{"steer":50,"throttle":-100,"t":1712}"#).unwrap();
        assert_eq!(
            payload,
            AxisPayload {
                steer: 50,
                throttle: -100,
                t: Some(1712),
            }
        );

        let command = payload.to_command();
        assert_eq!(command.convention, Convention::Axis);
        assert_eq!(command.throttle(), -100);
        assert_eq!(command.steer(), 50);
    }

    #[test]
    fn missing_fields_are_zero() {
        assert_eq!(parse_json(r#"{"throttle":20}"#).unwrap(), AxisPayload {
            steer: 0,
            throttle: 20,
            t: None,
        });
        assert_eq!(parse_json("{}").unwrap(), AxisPayload::default());
    }

    #[test]
    fn axes_are_clamped_to_percent() {
        let command = parse_json(r#"{"steer":-250,"throttle":101}"#)
            .unwrap()
            .to_command();
        assert_eq!((command.throttle(), command.steer()), (100, -100));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert_eq!(parse_json(r#"{"steer":"#), Err(StructuredError::MalformedJson));
        assert_eq!(parse_json(r#"{"steer":"left"}"#), Err(StructuredError::MalformedJson));
        assert_eq!(parse_json("{steer:1}"), Err(StructuredError::MalformedJson));
    }

    #[test]
    fn control_characters() {
        assert_eq!(parse_control(b'A'), Ok(ControlCommand::Auto));
        assert_eq!(parse_control(b'M'), Ok(ControlCommand::Manual));
        assert_eq!(parse_control(b'S'), Ok(ControlCommand::Stop));
        assert_eq!(parse_control(b'x'), Err(StructuredError::UnknownControl(b'x')));
    }
}
