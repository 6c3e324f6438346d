pub mod get;
pub mod list;
pub mod readme;

pub use get::{GetDatasetError, GetDatasetQuery};
pub use list::{ListDatasetsError, ListDatasetsQuery, ListDatasetsResponse};
pub use readme::{GetReadmeError, GetReadmeQuery};
