//! Weighted mod-11 check digit (position 9)

use serde::{Deserialize, Serialize};

use crate::vin::Vin;

/// Per-position weights; position 9 itself weighs 0.
const WEIGHTS: [u32; 17] = [8, 7, 6, 5, 4, 3, 2, 10, 0, 9, 8, 7, 6, 5, 4, 3, 2];

/// ISO 3779 transliteration. I, O and Q never appear in a valid VIN.
fn transliterate(ch: u8) -> Option<u32> {
    match ch {
        b'0'..=b'9' => Some((ch - b'0') as u32),
        b'A'..=b'H' => Some((ch - b'A') as u32 + 1),
        b'J'..=b'N' => Some((ch - b'J') as u32 + 1),
        b'P' => Some(7),
        b'R' => Some(9),
        b'S'..=b'Z' => Some((ch - b'S') as u32 + 2),
        _ => None,
    }
}

/// Verification outcome, surfaced as the `checkDigit` component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDigit {
    pub is_valid: bool,
    pub expected: Option<char>,
    pub actual: char,
}

/// Compute the expected check digit for a normalized VIN.
pub fn expected(vin: &Vin) -> Option<char> {
    let mut sum = 0u32;
    for (idx, &byte) in vin.as_str().as_bytes().iter().enumerate() {
        sum += transliterate(byte)? * WEIGHTS[idx];
    }
    Some(match sum % 11 {
        10 => 'X',
        digit => (b'0' + digit as u8) as char,
    })
}

/// Verify position 9 against the weighted sum. A mismatch is reported as a
/// warning by the pipeline; decoding continues.
pub fn verify(vin: &Vin) -> CheckDigit {
    let actual = vin.check_digit_char();
    let expected = expected(vin);
    CheckDigit {
        is_valid: expected == Some(actual),
        expected,
        actual,
    }
}
