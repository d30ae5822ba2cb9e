//! Structured decode errors and warnings
//!
//! Decode problems are data, not Rust errors: every [`DecodeError`] is a
//! stable `{code, category, message, severity}` record attached to the
//! result so downstream tooling can react without string matching.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error codes surfaced in `DecodeResult.errors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidLength,
    InvalidCharacters,
    EmptyInput,
    InvalidCheckDigit,
    NonUsYear,
    WmiNotFound,
    LookupMiss,
    PatternNoMatch,
    ModelMakeMismatch,
    Timeout,
    CatalogUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorCategory {
    Structure,
    Integrity,
    Catalog,
    Data,
    Runtime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Warning,
    /// Fatal: the result is marked invalid.
    Error,
}

impl ErrorCode {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorCode::InvalidLength | ErrorCode::InvalidCharacters | ErrorCode::EmptyInput => {
                ErrorCategory::Structure
            }
            ErrorCode::InvalidCheckDigit | ErrorCode::NonUsYear => ErrorCategory::Integrity,
            ErrorCode::WmiNotFound | ErrorCode::LookupMiss | ErrorCode::PatternNoMatch => {
                ErrorCategory::Catalog
            }
            ErrorCode::ModelMakeMismatch => ErrorCategory::Data,
            ErrorCode::Timeout | ErrorCode::CatalogUnavailable => ErrorCategory::Runtime,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ErrorCode::InvalidLength
            | ErrorCode::InvalidCharacters
            | ErrorCode::EmptyInput
            | ErrorCode::WmiNotFound
            | ErrorCode::Timeout
            | ErrorCode::CatalogUnavailable => ErrorSeverity::Error,
            ErrorCode::InvalidCheckDigit
            | ErrorCode::NonUsYear
            | ErrorCode::LookupMiss
            | ErrorCode::PatternNoMatch
            | ErrorCode::ModelMakeMismatch => ErrorSeverity::Warning,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::InvalidLength => "INVALID_LENGTH",
            ErrorCode::InvalidCharacters => "INVALID_CHARACTERS",
            ErrorCode::EmptyInput => "EMPTY_INPUT",
            ErrorCode::InvalidCheckDigit => "INVALID_CHECK_DIGIT",
            ErrorCode::NonUsYear => "NON_US_YEAR",
            ErrorCode::WmiNotFound => "WMI_NOT_FOUND",
            ErrorCode::LookupMiss => "LOOKUP_MISS",
            ErrorCode::PatternNoMatch => "PATTERN_NO_MATCH",
            ErrorCode::ModelMakeMismatch => "MODEL_MAKE_MISMATCH",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::CatalogUnavailable => "CATALOG_UNAVAILABLE",
        };
        f.write_str(name)
    }
}

/// One decode error or warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeError {
    pub code: ErrorCode,
    pub category: ErrorCategory,
    pub message: String,
    pub severity: ErrorSeverity,
}

impl DecodeError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        DecodeError {
            code,
            category: code.category(),
            severity: code.severity(),
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == ErrorSeverity::Error
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
