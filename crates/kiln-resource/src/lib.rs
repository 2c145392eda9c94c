//! Kiln Resource
//!
//! Turns a script location into text. [`locate`] resolves a location against a
//! [`ResourceScope`] to a URL; a [`ResourceFetcher`] reads the URL. The stock
//! [`UrlFetcher`] understands `file`, `http` and `https`.

mod error;
mod fetch;
mod locate;

pub use error::{FetchError, LocateError};
pub use fetch::{ResourceFetcher, UrlFetcher};
pub use locate::{ResourceScope, locate};
pub use url::Url;
