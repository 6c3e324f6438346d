//! Shared validation utilities
//!
//! Field checks used by the dataset commands. Lengths are counted in characters,
//! matching the column limits of the catalog schema.
//!
//! # Examples
//!
//! ```rust,ignore
//! use medcat_server::features::shared::validation::{validate_required, validate_max_len};
//!
//! validate_required("title", &command.title, TITLE_MAX_LEN)?;
//! validate_max_len("license", command.license.as_deref(), LICENSE_MAX_LEN)?;
//! ```

use thiserror::Error;

/// A single field failed validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldValidationError {
    #[error("{field} is required and cannot be empty")]
    Required { field: &'static str },

    #[error("{field} must be at most {max_length} characters")]
    TooLong {
        field: &'static str,
        max_length: usize,
    },

    #[error("{field} cannot be negative")]
    Negative { field: &'static str },
}

/// Validate a mandatory text field
///
/// # Rules
/// - Must not be empty (after trimming whitespace)
/// - Must not exceed `max_length` characters
pub fn validate_required(
    field: &'static str,
    value: &str,
    max_length: usize,
) -> Result<(), FieldValidationError> {
    if value.trim().is_empty() {
        return Err(FieldValidationError::Required { field });
    }
    validate_max_len(field, Some(value), max_length)
}

/// Validate the length of an optional text field
pub fn validate_max_len(
    field: &'static str,
    value: Option<&str>,
    max_length: usize,
) -> Result<(), FieldValidationError> {
    match value {
        Some(v) if v.chars().count() > max_length => {
            Err(FieldValidationError::TooLong { field, max_length })
        },
        _ => Ok(()),
    }
}

/// Validate that an optional count is not negative
pub fn validate_non_negative(
    field: &'static str,
    value: Option<i64>,
) -> Result<(), FieldValidationError> {
    match value {
        Some(v) if v < 0 => Err(FieldValidationError::Negative { field }),
        _ => Ok(()),
    }
}
