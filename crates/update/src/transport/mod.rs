//! Fetching remote documents.

mod http;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::http::HttpTransport;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockTransport;

use crate::error::Result;
use async_trait::async_trait;

/// Retrieves the full body behind a URL.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}
