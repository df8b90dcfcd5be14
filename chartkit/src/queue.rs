//! Serialized FIFO chart load queue.
//!
//! At most one chart loads at a time. Callers enqueue chart ids and get a
//! [`QueueEntry`] that reports its position (0 = loading now) and resolves
//! with the [`ChartLoadResult`] when the load finishes or is cancelled.
//!
//! ```text
//!  enqueue(A) ─┐
//!  enqueue(B) ─┼─► [A: 0] [B: 1] [C: 2] ──drain──► ChartLoadPipeline
//!  enqueue(C) ─┘      ▲ processing
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{ChartLoadError, QueueError};
use crate::pipeline::{ChartLoadPipeline, ChartLoadResult};

/// Snapshot of the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStatus {
    /// Chart being loaded, if any.
    pub current_chart_id: Option<String>,
    /// Waiting chart ids in order.
    pub pending_ids: Vec<String>,
    /// Pending entries plus the one loading.
    pub queue_length: usize,
}

/// Handle to a queued load.
///
/// Entries for the same chart id share one completion.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    chart_id: String,
    position: watch::Receiver<usize>,
    completion: watch::Receiver<Option<ChartLoadResult>>,
}

impl QueueEntry {
    /// Chart id.
    pub fn chart_id(&self) -> &str {
        &self.chart_id
    }

    /// Current position: 0 while loading, otherwise the place in line.
    pub fn position(&self) -> usize {
        *self.position.borrow()
    }

    /// The result, if already resolved.
    pub fn try_result(&self) -> Option<ChartLoadResult> {
        self.completion.borrow().clone()
    }

    /// Wait for the load to finish or be cancelled.
    pub async fn wait(mut self) -> ChartLoadResult {
        match self.completion.wait_for(Option::is_some).await {
            Ok(result) => match result.as_ref() {
                Some(result) => result.clone(),
                None => abandoned(&self.chart_id),
            },
            Err(_) => abandoned(&self.chart_id),
        }
    }
}

fn abandoned(chart_id: &str) -> ChartLoadResult {
    ChartLoadResult::failed(
        chart_id,
        ChartLoadError::Abandoned {
            chart_id: chart_id.to_string(),
        },
    )
}

fn cancelled(chart_id: &str) -> ChartLoadResult {
    ChartLoadResult::failed(
        chart_id,
        ChartLoadError::Cancelled {
            chart_id: chart_id.to_string(),
        },
    )
}

struct Slot {
    chart_id: String,
    position: watch::Sender<usize>,
    completion: watch::Sender<Option<ChartLoadResult>>,
}

impl Slot {
    fn new(chart_id: &str, position: usize) -> Arc<Self> {
        Arc::new(Self {
            chart_id: chart_id.to_string(),
            position: watch::Sender::new(position),
            completion: watch::Sender::new(None),
        })
    }

    fn entry(&self) -> QueueEntry {
        QueueEntry {
            chart_id: self.chart_id.clone(),
            position: self.position.subscribe(),
            completion: self.completion.subscribe(),
        }
    }

    /// Resolve unless already resolved. Returns whether this call resolved it.
    fn resolve(&self, result: ChartLoadResult) -> bool {
        self.completion.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(result);
            true
        })
    }
}

#[derive(Default)]
struct QueueState {
    processing: Option<Arc<Slot>>,
    pending: VecDeque<Arc<Slot>>,
    drain_task: Option<JoinHandle<()>>,
    disposed: bool,
}

impl QueueState {
    fn find(&self, chart_id: &str) -> Option<&Arc<Slot>> {
        self.processing
            .iter()
            .chain(self.pending.iter())
            .find(|slot| slot.chart_id == chart_id)
    }

    fn update_positions(&self) {
        let offset = usize::from(self.processing.is_some());
        if let Some(slot) = &self.processing {
            slot.position.send_replace(0);
        }
        for (i, slot) in self.pending.iter().enumerate() {
            slot.position.send_replace(i + offset);
        }
    }
}

struct QueueInner {
    pipeline: Arc<ChartLoadPipeline>,
    state: Mutex<QueueState>,
}

/// FIFO, single-consumer queue in front of a [`ChartLoadPipeline`].
///
/// Cloning yields another handle to the same queue.
///
/// # Example
///
/// ```ignore
/// use chartkit::queue::ChartLoadQueue;
///
/// let queue = ChartLoadQueue::new(pipeline);
/// let a = queue.enqueue("US5MA10M")?;
/// let b = queue.enqueue("US4MA23M")?;
/// assert_eq!((a.position(), b.position()), (0, 1));
/// let result = b.wait().await;
/// ```
#[derive(Clone)]
pub struct ChartLoadQueue {
    inner: Arc<QueueInner>,
}

impl ChartLoadQueue {
    /// Create an idle queue.
    pub fn new(pipeline: Arc<ChartLoadPipeline>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                pipeline,
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// The pipeline this queue drains into.
    pub fn pipeline(&self) -> &Arc<ChartLoadPipeline> {
        &self.inner.pipeline
    }

    /// Queue a load of `chart_id`.
    ///
    /// If the chart is already pending or loading, returns a handle to that
    /// entry instead of queueing it twice; an interrupt raised on that entry
    /// stays in force. A fresh entry clears any earlier interrupt of the
    /// chart. Starts the drain loop when idle, so this must be called from
    /// within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disposed`] after [`dispose`](Self::dispose).
    pub fn enqueue(&self, chart_id: &str) -> Result<QueueEntry, QueueError> {
        let mut state = self.inner.state.lock();
        if state.disposed {
            return Err(QueueError::Disposed);
        }

        if let Some(slot) = state.find(chart_id) {
            let entry = slot.entry();
            tracing::debug!(chart_id, position = entry.position(), "Chart already queued");
            return Ok(entry);
        }

        self.inner.pipeline.cancellation().reset(chart_id);
        let position = state.pending.len() + usize::from(state.processing.is_some());
        let slot = Slot::new(chart_id, position);
        let entry = slot.entry();
        state.pending.push_back(slot);

        if state.processing.is_none() {
            state.processing = state.pending.pop_front();
            state.update_positions();
            let inner = Arc::clone(&self.inner);
            state.drain_task = Some(tokio::spawn(drain(inner)));
        }

        tracing::info!(chart_id, position = entry.position(), "Chart queued for loading");
        Ok(entry)
    }

    /// Enqueue and wait for the result.
    pub async fn load(&self, chart_id: &str) -> Result<ChartLoadResult, QueueError> {
        Ok(self.enqueue(chart_id)?.wait().await)
    }

    /// Flag the chart being loaded for cancellation.
    ///
    /// The pipeline stops at its next cancellation check and the entry
    /// resolves as cancelled. Returns false when `chart_id` is not the chart
    /// being loaded.
    pub fn interrupt(&self, chart_id: &str) -> bool {
        let state = self.inner.state.lock();
        let running = state
            .processing
            .as_ref()
            .is_some_and(|slot| slot.chart_id == chart_id);
        if running {
            self.inner.pipeline.cancellation().cancel(chart_id);
            tracing::info!(chart_id, "Interrupting chart load");
        }
        running
    }

    /// Remove a pending entry and resolve it as cancelled.
    ///
    /// The chart being loaded is not interrupted. Returns whether a pending
    /// entry was removed.
    pub fn cancel(&self, chart_id: &str) -> bool {
        let slot = {
            let mut state = self.inner.state.lock();
            let Some(index) = state.pending.iter().position(|s| s.chart_id == chart_id) else {
                return false;
            };
            let slot = state.pending.remove(index);
            state.update_positions();
            slot
        };

        if let Some(slot) = slot {
            tracing::info!(chart_id, "Queued chart load cancelled");
            slot.resolve(cancelled(chart_id));
            return true;
        }
        false
    }

    /// Cancel every pending entry. The chart being loaded keeps going.
    ///
    /// Returns how many entries were cancelled.
    pub fn clear(&self) -> usize {
        let drained: Vec<Arc<Slot>> = {
            let mut state = self.inner.state.lock();
            state.pending.drain(..).collect()
        };
        for slot in &drained {
            slot.resolve(cancelled(&slot.chart_id));
        }
        if !drained.is_empty() {
            tracing::info!(cancelled = drained.len(), "Chart load queue cleared");
        }
        drained.len()
    }

    /// Cancel everything, stop the drain loop and refuse further work.
    pub fn dispose(&self) {
        let (slots, task) = {
            let mut state = self.inner.state.lock();
            state.disposed = true;
            let mut slots: Vec<Arc<Slot>> = state.processing.take().into_iter().collect();
            slots.extend(state.pending.drain(..));
            (slots, state.drain_task.take())
        };
        if let Some(task) = task {
            task.abort();
        }
        for slot in &slots {
            slot.resolve(cancelled(&slot.chart_id));
        }
        tracing::info!(cancelled = slots.len(), "Chart load queue disposed");
    }

    /// Whether [`dispose`](Self::dispose) was called.
    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// Snapshot of the queue.
    pub fn status(&self) -> QueueStatus {
        let state = self.inner.state.lock();
        QueueStatus {
            current_chart_id: state.processing.as_ref().map(|s| s.chart_id.clone()),
            pending_ids: state.pending.iter().map(|s| s.chart_id.clone()).collect(),
            queue_length: state.pending.len() + usize::from(state.processing.is_some()),
        }
    }
}

impl std::fmt::Debug for ChartLoadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartLoadQueue")
            .field("status", &self.status())
            .finish()
    }
}

/// Load the processing slot, resolve it, promote the next one; repeat.
///
/// Exits as soon as nothing is left to promote; the next `enqueue` starts a
/// fresh loop.
async fn drain(inner: Arc<QueueInner>) {
    let Some(mut slot) = inner.state.lock().processing.clone() else {
        return;
    };

    loop {
        let result = inner.pipeline.load(&slot.chart_id).await;

        let next = {
            let mut state = inner.state.lock();
            if state.disposed {
                return;
            }
            state.processing = state.pending.pop_front();
            state.update_positions();
            if state.processing.is_none() {
                state.drain_task = None;
            }
            state.processing.clone()
        };
        slot.resolve(result);

        match next {
            Some(next) => slot = next,
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::cell_at;
    use crate::pipeline::EncParser;
    use crate::source::MemorySource;

    fn queue_with(ids: &[&str]) -> ChartLoadQueue {
        let source = Arc::new(MemorySource::new());
        for (i, id) in ids.iter().enumerate() {
            source.insert(*id, cell_at(i as f64, i as f64));
        }
        let pipeline = ChartLoadPipeline::new(source, Arc::new(EncParser::default()));
        ChartLoadQueue::new(Arc::new(pipeline))
    }

    #[tokio::test]
    async fn test_positions() {
        let queue = queue_with(&["A", "B", "C"]);
        let a = queue.enqueue("A").unwrap();
        let b = queue.enqueue("B").unwrap();
        let c = queue.enqueue("C").unwrap();
        assert_eq!((a.position(), b.position(), c.position()), (0, 1, 2));

        let status = queue.status();
        assert_eq!(status.current_chart_id.as_deref(), Some("A"));
        assert_eq!(status.pending_ids, vec!["B", "C"]);
        assert_eq!(status.queue_length, 3);

        assert!(a.wait().await.is_success());
        assert_eq!((b.position(), c.position()), (0, 1));

        assert!(b.wait().await.is_success());
        assert!(c.wait().await.is_success());
        assert_eq!(queue.status(), QueueStatus::default());
    }

    #[tokio::test]
    async fn test_duplicate_enqueue_shares_one_load() {
        let queue = queue_with(&["A", "B"]);
        let a1 = queue.enqueue("A").unwrap();
        let b1 = queue.enqueue("B").unwrap();
        let a2 = queue.enqueue("A").unwrap();
        let b2 = queue.enqueue("B").unwrap();
        assert_eq!(a2.position(), 0);
        assert_eq!(b2.position(), 1);
        assert_eq!(queue.status().queue_length, 2);

        let (a1, a2) = (a1.wait().await, a2.wait().await);
        let (b1, b2) = (b1.wait().await, b2.wait().await);
        assert!(Arc::ptr_eq(a1.chart().unwrap(), a2.chart().unwrap()));
        assert!(Arc::ptr_eq(b1.chart().unwrap(), b2.chart().unwrap()));
        assert_eq!(queue.pipeline().stats().runs, 2);
    }

    #[tokio::test]
    async fn test_cancel_pending() {
        let queue = queue_with(&["A", "B", "C"]);
        let a = queue.enqueue("A").unwrap();
        let b = queue.enqueue("B").unwrap();
        let c = queue.enqueue("C").unwrap();

        assert!(queue.cancel("B"));
        assert!(!queue.cancel("B"));
        // The loading chart is not interrupted
        assert!(!queue.cancel("A"));
        assert_eq!(c.position(), 1);

        let b = b.wait().await;
        assert!(b.error().unwrap().is_cancelled());
        assert!(a.wait().await.is_success());
        assert!(c.wait().await.is_success());
        assert_eq!(queue.pipeline().stats().runs, 2);
    }

    #[tokio::test]
    async fn test_interrupt_current() {
        let queue = queue_with(&["A", "B"]);
        let a = queue.enqueue("A").unwrap();
        let b = queue.enqueue("B").unwrap();

        // Only the loading chart can be interrupted
        assert!(!queue.interrupt("B"));
        assert!(queue.interrupt("A"));
        assert!(queue.pipeline().cancellation().is_cancelled("A"));

        // Joining the running entry keeps the interrupt
        let again = queue.enqueue("A").unwrap();
        assert!(queue.pipeline().cancellation().is_cancelled("A"));

        assert!(a.wait().await.error().unwrap().is_cancelled());
        assert!(again.wait().await.error().unwrap().is_cancelled());
        assert!(b.wait().await.is_success());

        // A fresh entry starts clean
        assert!(queue.load("A").await.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_clear_keeps_current() {
        let queue = queue_with(&["A", "B", "C"]);
        let a = queue.enqueue("A").unwrap();
        let b = queue.enqueue("B").unwrap();
        let c = queue.enqueue("C").unwrap();

        assert_eq!(queue.clear(), 2);
        assert!(b.try_result().unwrap().error().unwrap().is_cancelled());
        assert!(c.wait().await.error().unwrap().is_cancelled());
        assert!(a.wait().await.is_success());

        // Cleared charts can be queued again
        assert!(queue.load("B").await.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_dispose() {
        let queue = queue_with(&["A", "B"]);
        let a = queue.enqueue("A").unwrap();
        let b = queue.enqueue("B").unwrap();

        queue.dispose();
        assert!(queue.is_disposed());
        assert!(a.wait().await.error().unwrap().is_cancelled());
        assert!(b.wait().await.error().unwrap().is_cancelled());
        assert_eq!(queue.enqueue("A").unwrap_err(), QueueError::Disposed);
        assert_eq!(queue.status(), QueueStatus::default());
    }

    #[tokio::test]
    async fn test_failed_load_does_not_stall_queue() {
        let queue = queue_with(&["B"]);
        let missing = queue.enqueue("MISSING").unwrap();
        let b = queue.enqueue("B").unwrap();

        assert!(matches!(
            missing.wait().await.error(),
            Some(ChartLoadError::DataNotFound { .. })
        ));
        assert!(b.wait().await.is_success());
    }
}
