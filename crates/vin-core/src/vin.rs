//! Normalized VIN and structural validation

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DecodeError, ErrorCode};

/// Letters ISO 3779 bans from every position.
const FORBIDDEN: [char; 3] = ['I', 'O', 'Q'];

/// A normalized (trimmed, uppercased) 17-character VIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Vin([u8; 17]);

impl Vin {
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).expect("validated ASCII")
    }

    /// 1-indexed position accessor, per ISO 3779 numbering.
    pub fn position(&self, pos: usize) -> char {
        debug_assert!((1..=17).contains(&pos));
        self.0[pos - 1] as char
    }

    /// World Manufacturer Identifier, positions 1..3.
    pub fn wmi_code(&self) -> &str {
        &self.as_str()[0..3]
    }

    /// Vehicle Descriptor Section bytes, positions 4..9.
    pub fn vds(&self) -> [u8; 6] {
        let mut vds = [0u8; 6];
        vds.copy_from_slice(&self.0[3..9]);
        vds
    }

    pub fn check_digit_char(&self) -> char {
        self.position(9)
    }

    pub fn year_code(&self) -> char {
        self.position(10)
    }

    pub fn plant_code(&self) -> char {
        self.position(11)
    }

    /// Vehicle Identifier Section, positions 12..17.
    pub fn vis(&self) -> &str {
        &self.as_str()[11..17]
    }

    /// Positions 12..14 extend the WMI for manufacturers below 1000
    /// vehicles/year, flagged by '9' at position 3.
    pub fn low_volume_extension(&self) -> Option<&str> {
        if self.position(3) == '9' {
            Some(&self.as_str()[11..14])
        } else {
            None
        }
    }
}

impl fmt::Display for Vin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Vin {
    type Error = DecodeError;

    fn try_from(value: String) -> Result<Self, DecodeError> {
        validate(&value)
    }
}

impl From<Vin> for String {
    fn from(vin: Vin) -> String {
        vin.as_str().to_string()
    }
}

/// Trim and uppercase, for echoing rejected inputs back to the caller.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Structural validation: length, alphabet, forbidden letters, and the
/// position-10 restrictions. Position-10 '0' passes here; the year
/// resolver reports it as a non-US year.
pub fn validate(raw: &str) -> Result<Vin, DecodeError> {
    let normalized = normalize(raw);
    if normalized.is_empty() {
        return Err(DecodeError::new(ErrorCode::EmptyInput, "VIN is empty"));
    }
    if normalized.len() != 17 {
        return Err(DecodeError::new(
            ErrorCode::InvalidLength,
            format!("VIN must be 17 characters, found {}", normalized.len()),
        ));
    }

    let mut offending = Vec::new();
    for (idx, ch) in normalized.chars().enumerate() {
        if FORBIDDEN.contains(&ch) || !ch.is_ascii_alphanumeric() {
            offending.push((idx + 1, ch));
        }
    }
    let year_code = normalized.as_bytes()[9] as char;
    if year_code == 'U' || year_code == 'Z' {
        offending.push((10, year_code));
    }
    if !offending.is_empty() {
        let detail = offending
            .iter()
            .map(|(pos, ch)| format!("'{}' at position {}", ch, pos))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(DecodeError::new(
            ErrorCode::InvalidCharacters,
            format!("invalid characters: {}", detail),
        ));
    }

    let mut bytes = [0u8; 17];
    bytes.copy_from_slice(normalized.as_bytes());
    Ok(Vin(bytes))
}
