//! Where chart bytes come from.
//!
//! The load pipeline only needs `extract(chart_id) -> bytes | absent`. Two
//! sources are provided:
//!
//! - [`DirectorySource`]: cells in a data directory (`.000`, `.000.gz`, `.zip`)
//! - [`MemorySource`]: cells held in memory, for embedding and tests

mod directory;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use parking_lot::RwLock;

use crate::error::Result;

pub use directory::DirectorySource;

/// Boxed future returned by [`ChartSource`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Archive/extraction collaborator of the load pipeline.
pub trait ChartSource: Send + Sync {
    /// Raw cell bytes for `chart_id`, or `None` when the source has no such chart.
    fn extract<'a>(&'a self, chart_id: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>>>;

    /// Chart ids this source can provide, sorted.
    fn available(&self) -> Result<Vec<String>>;
}

/// In-memory chart source.
#[derive(Debug, Default)]
pub struct MemorySource {
    charts: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a chart.
    pub fn insert(&self, chart_id: impl Into<String>, data: Vec<u8>) {
        self.charts.write().insert(chart_id.into(), data);
    }

    /// Remove a chart, returning its bytes.
    pub fn remove(&self, chart_id: &str) -> Option<Vec<u8>> {
        self.charts.write().remove(chart_id)
    }
}

impl ChartSource for MemorySource {
    fn extract<'a>(&'a self, chart_id: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>>> {
        Box::pin(async move { Ok(self.charts.read().get(chart_id).cloned()) })
    }

    fn available(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.charts.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_source() {
        let source = MemorySource::new();
        source.insert("B", vec![2]);
        source.insert("A", vec![1]);

        assert_eq!(source.extract("A").await.unwrap(), Some(vec![1]));
        assert_eq!(source.extract("C").await.unwrap(), None);
        assert_eq!(source.available().unwrap(), vec!["A", "B"]);

        source.insert("A", vec![9]);
        assert_eq!(source.extract("A").await.unwrap(), Some(vec![9]));
        assert_eq!(source.remove("A"), Some(vec![9]));
        assert_eq!(source.extract("A").await.unwrap(), None);
    }
}
