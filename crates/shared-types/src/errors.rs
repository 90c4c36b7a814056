//! # Error Types
//!
//! Structural validation failures of wire entities.

use thiserror::Error;

/// A wire entity failed structural validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// A required string field is empty.
    #[error("field `{0}` is empty")]
    EmptyField(&'static str),

    /// A string field exceeds its maximum length.
    #[error("field `{field}` is too long: {actual} > {max}")]
    TooLong {
        field: &'static str,
        actual: usize,
        max: usize,
    },

    /// A field is not valid hex of the expected size.
    #[error("field `{0}` is not valid hex")]
    InvalidHex(&'static str),

    /// A numeric field is below its minimum.
    #[error("field `{field}` must be >= {min}")]
    BelowMinimum { field: &'static str, min: u64 },

    /// A collection has an invalid number of elements.
    #[error("field `{field}` must hold between {min} and {max} items, got {actual}")]
    InvalidCount {
        field: &'static str,
        actual: usize,
        min: usize,
        max: usize,
    },

    /// A nested entity is malformed.
    #[error("{entity} {index}: {source}")]
    Nested {
        entity: &'static str,
        index: usize,
        #[source]
        source: Box<TypeError>,
    },
}

/// Check a required identifier-like string.
pub(crate) fn check_id(field: &'static str, value: &str, max: usize) -> Result<(), TypeError> {
    if value.is_empty() {
        return Err(TypeError::EmptyField(field));
    }
    if value.chars().count() > max {
        return Err(TypeError::TooLong {
            field,
            actual: value.chars().count(),
            max,
        });
    }
    Ok(())
}

/// Check a hex-encoded field of an optional exact byte size.
pub(crate) fn check_hex(
    field: &'static str,
    value: &str,
    bytes: Option<usize>,
) -> Result<(), TypeError> {
    if crate::is_hex(value, bytes) {
        Ok(())
    } else {
        Err(TypeError::InvalidHex(field))
    }
}
