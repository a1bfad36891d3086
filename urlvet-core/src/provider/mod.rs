//! External scanning provider client.
//!
//! The provider is reached over two HTTP calls: submit a URL, then poll
//! for the finished result. Neither call surfaces an error to the
//! caller; every failure path resolves to "empty" so the worker treats
//! absence uniformly as not-ready-or-failed.

mod mock;
mod urlscan;

pub use mock::MockProvider;
pub use urlscan::{UrlscanClient, UrlscanConfig};

use async_trait::async_trait;

#[async_trait]
pub trait ScanProvider: Send + Sync {
    /// Submit a URL for scanning. Returns the provider-assigned scan id,
    /// or `None` when the submission was rejected, rate-limited past the
    /// retry budget, or failed unexpectedly.
    async fn submit(&self, url: &str) -> Option<String>;

    /// Fetch the result for a previously submitted scan. Returns `None`
    /// while the result is not ready, and on any error.
    async fn fetch_result(&self, external_id: &str) -> Option<serde_json::Value>;
}
