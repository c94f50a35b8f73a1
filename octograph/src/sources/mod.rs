pub mod octopus;
pub mod paginated;

pub use octopus::OctopusApi;
pub use paginated::{PaginatedFetcher, RetryState, MAX_ERROR_COUNT};
