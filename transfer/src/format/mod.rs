//! Intermediate data format used when a record crosses between text and typed fields.
//!
//! Records are encoded as comma separated fields. Nulls are the bare `NULL` literal, booleans
//! and numbers are unquoted, text is single-quoted with backslash escapes and bytes are written
//! as `X'..'` hex literals.

pub mod csv;
mod hex;

use thiserror::Error;

/// Errors raised while decoding CSV text into typed fields.
///
/// Field positions are zero-based.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseRecordError {
    #[error("field {field} is empty")]
    EmptyField { field: usize },

    #[error("field {field} has an unterminated quoted value")]
    UnterminatedQuote { field: usize },

    #[error("field {field} uses the unsupported escape sequence `\\{escape}`")]
    InvalidEscape { field: usize, escape: char },

    #[error("field {field} holds `{token}`, which is not a valid value")]
    InvalidToken { field: usize, token: String },

    #[error("field {field} is not followed by a separator")]
    MissingSeparator { field: usize },

    #[error("field {field} holds a malformed hex literal")]
    InvalidHex { field: usize },
}
