//! Per-wheel text variant: `M1:<int>,M2:<int>`
//!
//! Fields are comma separated `KEY:VALUE` tokens. A missing field is zero. A
//! field whose value does not parse is reported and treated as zero, and the
//! other field is still used. Range is not checked here; the drive clamps.

use heapless::Vec;

use crate::command::MotionCommand;

/// Which speed field a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    M1,
    M2,
}

/// Why a field value was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldReason {
    /// Nothing after the `:`
    Empty,
    /// Not a decimal integer
    InvalidDigit,
    /// Does not fit in an `i32`
    OutOfRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TextFieldError {
    pub field: Field,
    pub reason: FieldReason,
}

/// Raw per-wheel speeds as sent, before clamping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WheelSpeeds {
    pub m1: i32,
    pub m2: i32,
}

impl WheelSpeeds {
    pub fn to_command(self) -> MotionCommand {
        MotionCommand::per_wheel(self.m1, self.m2)
    }
}

/// Result of parsing a text command; never fails as a whole
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextParse {
    Ok(WheelSpeeds),
    /// At least one field was unusable and has been zeroed
    PartialError {
        speeds: WheelSpeeds,
        errors: Vec<TextFieldError, 2>,
    },
}

impl TextParse {
    pub fn speeds(&self) -> WheelSpeeds {
        match self {
            TextParse::Ok(speeds) => *speeds,
            TextParse::PartialError { speeds, .. } => *speeds,
        }
    }

    pub fn errors(&self) -> &[TextFieldError] {
        match self {
            TextParse::Ok(_) => &[],
            TextParse::PartialError { errors, .. } => errors,
        }
    }
}

/// Parses `M1:<int>,M2:<int>`; the first occurrence of a key wins
pub fn parse(input: &str) -> TextParse {
    let mut m1: Option<Result<i32, FieldReason>> = None;
    let mut m2: Option<Result<i32, FieldReason>> = None;

    for token in input.split(',') {
        let Some((key, value)) = token.split_once(':') else {
            continue;
        };

        let slot = match key.trim() {
            "M1" => &mut m1,
            "M2" => &mut m2,
            _ => continue,
        };

        if slot.is_none() {
            *slot = Some(parse_value(value.trim()));
        }
    }

    let mut speeds = WheelSpeeds::default();
    let mut errors = Vec::new();

    for (field, slot, target) in [
        (Field::M1, m1, &mut speeds.m1),
        (Field::M2, m2, &mut speeds.m2),
    ] {
        match slot {
            Some(Ok(value)) => *target = value,
            Some(Err(reason)) => {
                warn!("Error parsing {:?} speed: {:?}", field, reason);
                // capacity equals the number of fields
                let _ = errors.push(TextFieldError { field, reason });
            }
            None => {}
        }
    }

    if errors.is_empty() {
        TextParse::Ok(speeds)
    } else {
        TextParse::PartialError { speeds, errors }
    }
}

fn parse_value(value: &str) -> Result<i32, FieldReason> {
    if value.is_empty() {
        return Err(FieldReason::Empty);
    }

    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FieldReason::InvalidDigit);
    }

    value.parse::<i32>().map_err(|_| FieldReason::OutOfRange)
}
