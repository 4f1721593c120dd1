pub mod fetch;
pub mod static_models;

pub use fetch::{catalog_candidates, fetch_candidates};
pub use static_models::{default_candidates, DEFAULT_CANDIDATES};
