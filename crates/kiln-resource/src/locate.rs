//! Location resolution.

use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::error::LocateError;

/// Ordered search roots for relative locations.
///
/// Each dispatch context owns a scope, so two contexts can resolve the same
/// relative location to different scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceScope {
  roots: Vec<PathBuf>,
}

impl ResourceScope {
  pub fn new(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
    Self {
      roots: roots.into_iter().map(Into::into).collect(),
    }
  }

  pub fn roots(&self) -> &[PathBuf] {
    &self.roots
  }

  /// A scope searching this scope's roots first, then `other`'s.
  pub fn chain(&self, other: &ResourceScope) -> ResourceScope {
    let mut roots = self.roots.clone();
    roots.extend(other.roots.iter().filter(|r| !self.roots.contains(r)).cloned());
    ResourceScope { roots }
  }
}

/// Resolve a location to a URL.
///
/// Resolution order:
/// 1. An absolute `http`, `https` or `file` URL is returned unchanged.
/// 2. The first scope root containing `location` as a file.
/// 3. `location` as a plain filesystem path.
///
/// # Errors
/// [`LocateError::EmptyLocation`] for a blank location,
/// [`LocateError::NotFound`] when nothing matches.
pub async fn locate(location: &str, scope: &ResourceScope) -> Result<Url, LocateError> {
  let location = location.trim();
  if location.is_empty() {
    return Err(LocateError::EmptyLocation);
  }

  if let Ok(url) = Url::parse(location) {
    if matches!(url.scheme(), "http" | "https" | "file") {
      return Ok(url);
    }
  }

  let relative = location.trim_start_matches('/');
  for root in scope.roots() {
    let candidate = root.join(relative);
    if let Some(url) = file_url(&candidate).await {
      debug!(location, root = %root.display(), "resource located in scope");
      return Ok(url);
    }
  }

  if let Some(url) = file_url(Path::new(location)).await {
    return Ok(url);
  }

  Err(LocateError::NotFound {
    location: location.to_string(),
  })
}

async fn file_url(path: &Path) -> Option<Url> {
  let metadata = tokio::fs::metadata(path).await.ok()?;
  if !metadata.is_file() {
    return None;
  }
  let canonical = tokio::fs::canonicalize(path).await.ok()?;
  Url::from_file_path(canonical).ok()
}
