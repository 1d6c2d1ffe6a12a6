// SPDX-License-Identifier: MIT OR Apache-2.0
//! Record model for hs.
//!
//! A [`Record`] is the universal data value flowing through every hs
//! pipeline: a JSON-shaped dynamically-typed value. This crate provides the
//! type alias plus the handful of coercions the rest of the system relies
//! on, the input [`stream`] sources that parse records out of bytes, and
//! [`datafmt`] autodetection shared by input handling and the HTTP builder.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod datafmt;
pub mod stream;

use serde_json::Value;

/// A single data item. Always one of: null, bool, number, string, array,
/// object. Freely JSON-encodable.
pub type Record = Value;

/// Convenience alias for an array-shaped [`Record`].
pub type Array = Vec<Value>;

/// Convenience alias for an object-shaped [`Record`].
pub type Object = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from record coercion and record-stream parsing.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Reading the underlying byte source failed.
    #[error("reading input: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON value failed to decode.
    #[error("decoding json: {0}")]
    Json(#[from] serde_json::Error),

    /// A CSV/TSV row failed to decode.
    #[error("decoding csv: {0}")]
    Csv(#[from] csv::Error),

    /// A number was expected but another variant was found.
    #[error("expected a number, got {actual}")]
    NotANumber {
        /// Variant name of the offending value.
        actual: &'static str,
    },

    /// A number was found but it is not an integer.
    #[error("non-integer number {value}")]
    NotAnInteger {
        /// The offending value.
        value: f64,
    },

    /// A string or array-of-strings was expected.
    #[error("expected string or array of strings, got {actual}")]
    NotStrings {
        /// Variant name of the offending value.
        actual: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Coercions
// ---------------------------------------------------------------------------

/// Returns the variant name of a record, for diagnostics.
pub fn type_name(rec: &Record) -> &'static str {
    match rec {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Formats a record as a string: strings pass through as-is, everything
/// else is encoded as compact JSON.
pub fn coerce_string(rec: &Record) -> String {
    match rec {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Converts a number-valued record to a non-negative integer index.
pub fn number_to_index(rec: &Record) -> Result<usize, RecordError> {
    let f = rec.as_f64().ok_or(RecordError::NotANumber {
        actual: type_name(rec),
    })?;
    let i = f as i64;
    if i as f64 != f {
        return Err(RecordError::NotAnInteger { value: f });
    }
    usize::try_from(i).map_err(|_| RecordError::NotAnInteger { value: f })
}

/// Converts a record to an array of strings:
/// - null yields an empty array
/// - an array of strings yields those strings
/// - a bare string yields a single-element array when `allow_string` is set
pub fn as_strings_array(rec: &Record, allow_string: bool) -> Result<Vec<String>, RecordError> {
    match rec {
        Value::Null => Ok(Vec::new()),
        Value::String(s) if allow_string => Ok(vec![s.clone()]),
        Value::Array(elems) => elems
            .iter()
            .map(|e| match e {
                Value::String(s) => Ok(s.clone()),
                other => Err(RecordError::NotStrings {
                    actual: type_name(other),
                }),
            })
            .collect(),
        other => Err(RecordError::NotStrings {
            actual: type_name(other),
        }),
    }
}
