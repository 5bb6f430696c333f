pub mod cache;
pub mod reader;

pub use cache::{CacheBackend, MemoryCache, RedisCache};
pub use reader::{WishlistReader, WishlistStore};
