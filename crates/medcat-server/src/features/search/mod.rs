pub mod queries;
pub mod routes;

pub use queries::{
    ListFiltersError, SearchDatasetsError, SearchDatasetsQuery, SearchDatasetsResponse,
};

pub use routes::search_routes;
