pub mod neighborhoods;
pub mod search_tests;
pub mod updates;
pub mod vns;

pub use neighborhoods::{default_neighborhoods, Neighborhood};
pub use updates::PlanUpdate;
pub use vns::{cost, plan_search, search, CancellationToken, SearchParams, SearchResult};
