pub mod create;
pub mod update;

pub use create::{CreateDatasetCommand, CreateDatasetError};
pub use update::{UpdateDatasetCommand, UpdateDatasetError};
