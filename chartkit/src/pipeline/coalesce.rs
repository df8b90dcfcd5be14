//! Coalescing of concurrent loads of the same chart.
//!
//! ```text
//! load("A") ─┐
//!            ├──► LoadCoalescer ──► one pipeline run for "A"
//! load("A") ─┘          ▲                    │
//!                       └──── same result ◄──┘
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::ChartLoadResult;

/// Registry of in-flight loads keyed by chart id.
#[derive(Debug, Default)]
pub(crate) struct LoadCoalescer {
    in_flight: Mutex<HashMap<String, broadcast::Sender<ChartLoadResult>>>,
    runs: AtomicU64,
    coalesced: AtomicU64,
}

/// Outcome of [`LoadCoalescer::register`].
pub(crate) enum Registration<'a> {
    /// No load was in flight; the caller must run it and call
    /// [`InFlight::complete`].
    Leader(InFlight<'a>),
    /// Another caller is running the load; wait here for its result.
    Follower(broadcast::Receiver<ChartLoadResult>),
}

impl LoadCoalescer {
    pub(crate) fn register(&self, chart_id: &str) -> Registration<'_> {
        let mut in_flight = self.in_flight.lock();
        if let Some(tx) = in_flight.get(chart_id) {
            let coalesced = self.coalesced.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(chart_id, coalesced, "Coalescing load onto in-flight run");
            return Registration::Follower(tx.subscribe());
        }

        let (tx, _rx) = broadcast::channel(1);
        in_flight.insert(chart_id.to_string(), tx.clone());
        self.runs.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(chart_id, in_flight = in_flight.len(), "Starting new load run");
        Registration::Leader(InFlight {
            coalescer: self,
            chart_id: chart_id.to_string(),
            sender: tx,
            completed: false,
        })
    }

    /// Whether a run for `chart_id` is in flight.
    pub(crate) fn is_in_flight(&self, chart_id: &str) -> bool {
        self.in_flight.lock().contains_key(chart_id)
    }

    /// Pipeline runs started.
    pub(crate) fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Loads that joined a run instead of starting one.
    pub(crate) fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    fn remove(&self, chart_id: &str, sender: &broadcast::Sender<ChartLoadResult>) {
        let mut in_flight = self.in_flight.lock();
        if in_flight
            .get(chart_id)
            .is_some_and(|tx| tx.same_channel(sender))
        {
            in_flight.remove(chart_id);
        }
    }
}

/// Ownership of an in-flight run.
///
/// Dropping it without calling [`complete`](Self::complete) (for example
/// when the leading future is dropped) unregisters the run and closes the
/// channel, so followers observe an abandoned load instead of waiting forever.
pub(crate) struct InFlight<'a> {
    coalescer: &'a LoadCoalescer,
    chart_id: String,
    sender: broadcast::Sender<ChartLoadResult>,
    completed: bool,
}

impl InFlight<'_> {
    /// Unregister the run and hand `result` to every follower.
    pub(crate) fn complete(mut self, result: &ChartLoadResult) {
        self.coalescer.remove(&self.chart_id, &self.sender);
        let followers = self.sender.receiver_count();
        // No receivers is not an error
        let _ = self.sender.send(result.clone());
        if followers > 0 {
            tracing::debug!(
                chart_id = %self.chart_id,
                followers,
                "Broadcast load result to coalesced callers"
            );
        }
        self.completed = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.completed {
            tracing::debug!(chart_id = %self.chart_id, "In-flight load dropped before completing");
            self.coalescer.remove(&self.chart_id, &self.sender);
        }
    }
}
