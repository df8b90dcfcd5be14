use std::collections::HashSet;

use parking_lot::Mutex;

/// Per-chart cancellation flags polled by the pipeline.
///
/// A flag stays set until [`reset`](Self::reset) is called for the chart id,
/// so a cancelled chart keeps failing fast until someone asks for it again.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    cancelled: Mutex<HashSet<String>>,
}

impl CancellationRegistry {
    /// Create a registry with no flags set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag `chart_id` as cancelled.
    pub fn cancel(&self, chart_id: &str) {
        if self.cancelled.lock().insert(chart_id.to_string()) {
            tracing::debug!(chart_id, "Chart load cancellation requested");
        }
    }

    /// Whether `chart_id` is flagged.
    pub fn is_cancelled(&self, chart_id: &str) -> bool {
        self.cancelled.lock().contains(chart_id)
    }

    /// Clear the flag for `chart_id`. Returns whether it was set.
    pub fn reset(&self, chart_id: &str) -> bool {
        self.cancelled.lock().remove(chart_id)
    }

    /// Clear every flag.
    pub fn reset_all(&self) {
        self.cancelled.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let registry = CancellationRegistry::new();
        assert!(!registry.is_cancelled("A"));

        registry.cancel("A");
        registry.cancel("A");
        assert!(registry.is_cancelled("A"));
        assert!(!registry.is_cancelled("B"));

        assert!(registry.reset("A"));
        assert!(!registry.reset("A"));
        assert!(!registry.is_cancelled("A"));

        registry.cancel("B");
        registry.reset_all();
        assert!(!registry.is_cancelled("B"));
    }
}
