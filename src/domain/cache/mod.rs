//! Cache domain - Key-value cache store abstraction shared by the embedding and semantic caches

mod key;
mod repository;

pub use key::{normalize_query, HashedKeyBuilder};
pub use repository::{Cache, CacheExt};

#[cfg(test)]
pub use repository::mock::MockCache;
