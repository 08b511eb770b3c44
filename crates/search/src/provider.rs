//! The [`DocumentSearch`] trait and its no-op implementation.

use async_trait::async_trait;
use lt_domain::error::Result;

use crate::types::Passage;

/// A document index that can be queried with free text.
///
/// Implementations may fail; callers that must not fail go through
/// [`crate::ContextRetriever`].
#[async_trait]
pub trait DocumentSearch: Send + Sync {
    /// Top passages for `query`, best first.
    async fn search(&self, query: &str) -> Result<Vec<Passage>>;

    /// Whether this backend can ever return results.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Used when no index is configured. Always empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSearch;

#[async_trait]
impl DocumentSearch for NoopSearch {
    async fn search(&self, _query: &str) -> Result<Vec<Passage>> {
        Ok(Vec::new())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
