//! Shared utilities for feature modules
//!
//! - **pagination**: page parameters and response metadata
//! - **validation**: field-level input checks

pub mod pagination;
pub mod validation;

pub use pagination::{PaginationMetadata, PaginationParams};
pub use validation::FieldValidationError;
