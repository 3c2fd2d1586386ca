//! Inbound command protocol
//!
//! One framed line is classified and parsed into an [`Inbound`] message:
//!
//! - a single byte is a control command (`A`, `M`, `S`)
//! - a line starting with `{` is a JSON axis payload
//! - a line starting with `M1:` or `M2:` is the per-wheel text variant
//!
//! Anything else is rejected. Rejected lines never reach the controller.

pub mod structured;
pub mod text;

use crate::command::Inbound;

pub use structured::{AxisPayload, StructuredError};
pub use text::{Field, FieldReason, TextFieldError, TextParse, WheelSpeeds};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    Empty,
    /// Not valid UTF-8
    Encoding,
    UnknownFormat,
    Structured(StructuredError),
}

impl From<StructuredError> for ParseError {
    fn from(error: StructuredError) -> Self {
        ParseError::Structured(error)
    }
}

/// Parses one line with its terminator already stripped
pub fn parse_line(line: &[u8]) -> Result<Inbound, ParseError> {
    let line = core::str::from_utf8(line).map_err(|_| ParseError::Encoding)?;
    let line = line.trim();

    match line.as_bytes() {
        [] => Err(ParseError::Empty),
        [byte] => Ok(Inbound::Control(structured::parse_control(*byte)?)),
        [b'{', ..] => Ok(Inbound::Motion(structured::parse_json(line)?.to_command())),
        _ if line.starts_with("M1:") || line.starts_with("M2:") => {
            let parsed = text::parse(line);
            if !parsed.errors().is_empty() {
                debug!("Text command partially applied: {}", line);
            }
            Ok(Inbound::Motion(parsed.speeds().to_command()))
        }
        _ => {
            warn!("Unknown command format");
            Err(ParseError::UnknownFormat)
        }
    }
}
