//! Script source caching.
//!
//! Sources are loaded once per key and shared as `Arc<str>`. Concurrent
//! first loads of a key wait on the same loader; loads of different keys run
//! independently.

mod cache;
mod error;

pub use cache::{CacheConfig, MIN_SOURCE_LEN, SourceCache};
pub use error::CacheError;
