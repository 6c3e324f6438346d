pub mod list_filters;
pub mod search_datasets;

pub use list_filters::ListFiltersError;
pub use search_datasets::{
    SearchDatasetsError, SearchDatasetsQuery, SearchDatasetsResponse,
};
