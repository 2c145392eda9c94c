use thiserror::Error;

/// Errors resolving a location to a URL.
#[derive(Debug, Error)]
pub enum LocateError {
  #[error("resource location is empty")]
  EmptyLocation,

  #[error("resource '{location}' not found")]
  NotFound { location: String },
}

/// Errors reading a resource.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("unsupported url scheme '{scheme}' in {url}")]
  UnsupportedScheme { scheme: String, url: String },

  #[error("invalid file url: {url}")]
  InvalidFileUrl { url: String },

  #[error("failed to read {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),
}
