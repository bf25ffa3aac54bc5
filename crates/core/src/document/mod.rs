//! Document access: fetching pages and navigating parsed markup.

mod fetcher;
mod http;
pub mod query;

pub use fetcher::{DocumentFetcher, FetchError};
pub use http::HttpFetcher;
