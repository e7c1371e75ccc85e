pub mod cache;
pub mod search;
pub mod serve;

pub use cache::cache_clear;
pub use search::{search, SearchParams};
pub use serve::serve;
