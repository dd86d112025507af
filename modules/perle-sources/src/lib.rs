//! Content sources: where candidate perle come from.
//!
//! Two interchangeable variants sit behind [`ContentSource`]:
//! - [`TabularSource`]: a published spreadsheet fetched as delimited text
//! - [`DocumentSource`]: a rendered web page scraped with CSS selectors
//!
//! Both validate rows into [`ContentItem`]s at this boundary, so nothing
//! malformed reaches the store.

pub mod document;
pub mod error;
pub mod fetcher;
pub mod tabular;

pub use document::{DocumentRules, DocumentSource};
pub use error::{Result, SourceError};
pub use fetcher::{BrowserlessFetcher, HttpFetcher, PageFetcher};
pub use tabular::TabularSource;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use perle_common::ContentItem;

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch the current candidates. Items are valid and unique by id.
    async fn fetch(&self) -> Result<Vec<ContentItem>>;

    fn name(&self) -> &str;
}

#[async_trait]
impl<T: ContentSource + ?Sized> ContentSource for Arc<T> {
    async fn fetch(&self) -> Result<Vec<ContentItem>> {
        (**self).fetch().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Drop later items whose id was already seen, preserving order.
pub(crate) fn dedup_by_id(items: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}
