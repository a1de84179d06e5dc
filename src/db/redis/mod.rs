pub mod cache;

mod macros;

pub use cache::{connect, Cache, CacheKey, CacheWriterHandle};
