pub mod api;
pub mod rss;

pub use api::ApiFetcher;
pub use rss::RssFetcher;
