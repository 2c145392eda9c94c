//! Cache errors.

/// Errors returned by [`SourceCache::get_or_load`](crate::SourceCache::get_or_load).
///
/// Neither variant leaves an entry behind for the key.
#[derive(Debug, thiserror::Error)]
pub enum CacheError<E>
where
  E: std::error::Error + 'static,
{
  /// The loader failed.
  #[error("failed to load source for '{key}'")]
  Load {
    key: String,
    #[source]
    source: E,
  },

  /// The loader returned empty or near-empty text.
  #[error("source for '{key}' is null or empty ({len} chars, need at least {min})")]
  TooShort { key: String, len: usize, min: usize },
}
