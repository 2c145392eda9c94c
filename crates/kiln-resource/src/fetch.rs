//! Resource fetching.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::FetchError;

/// Reads the text behind a located URL.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
  /// Fetch the resource as text. Failures are returned immediately, never retried.
  async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// Fetches `file`, `http` and `https` URLs.
#[derive(Debug, Clone)]
pub struct UrlFetcher {
  client: Client,
}

impl UrlFetcher {
  /// Create a fetcher whose HTTP requests time out after `timeout`.
  pub fn new(timeout: Duration) -> Result<Self, FetchError> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client })
  }

  /// Create a fetcher around an existing HTTP client.
  pub fn with_client(client: Client) -> Self {
    Self { client }
  }

  async fn fetch_file(&self, url: &Url) -> Result<String, FetchError> {
    let path = url.to_file_path().map_err(|_| FetchError::InvalidFileUrl {
      url: url.to_string(),
    })?;

    tokio::fs::read_to_string(&path)
      .await
      .map_err(|source| FetchError::Io {
        path: path.display().to_string(),
        source,
      })
  }

  async fn fetch_http(&self, url: &Url) -> Result<String, FetchError> {
    let response = self.client.get(url.clone()).send().await?.error_for_status()?;
    Ok(response.text().await?)
  }
}

#[async_trait]
impl ResourceFetcher for UrlFetcher {
  async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
    debug!(url = %url, "fetching resource");

    match url.scheme() {
      "file" => self.fetch_file(url).await,
      "http" | "https" => self.fetch_http(url).await,
      scheme => Err(FetchError::UnsupportedScheme {
        scheme: scheme.to_string(),
        url: url.to_string(),
      }),
    }
  }
}
