pub mod commands;
pub mod queries;
pub mod routes;

pub use commands::{
    CreateDatasetCommand, CreateDatasetError, UpdateDatasetCommand, UpdateDatasetError,
};

pub use queries::{
    GetDatasetError, GetDatasetQuery, GetReadmeError, GetReadmeQuery, ListDatasetsError,
    ListDatasetsQuery, ListDatasetsResponse,
};

pub use routes::datasets_routes;
