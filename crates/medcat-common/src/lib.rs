//! MedCat Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared ambient pieces for the MedCat workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and the [`Result`] alias
//! - **Environment**: typed helpers for reading configuration variables
//! - **Logging**: `tracing` subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use medcat_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> medcat_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod env;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{CommonError, Result};
