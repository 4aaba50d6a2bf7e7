//! Bounded drop-oldest ingestion queue and its background consumer

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::service::IngestService;
use crate::error::{Error, Result};

/// A file-system change reported by an external watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// File created or modified: (re)ingest it
    Changed(PathBuf),
    /// File deleted: drop its fragments
    Removed(PathBuf),
}

/// Fixed-capacity queue that never blocks producers
///
/// When full, a push evicts the oldest unconsumed item. Under sustained
/// overload the index falls behind rather than the producer.
pub struct IngestQueue<T = FileEvent> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl<T> IngestQueue<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::config("queue capacity must be at least 1"));
        }
        Ok(Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        })
    }

    /// Enqueue without blocking
    ///
    /// Returns the item that was discarded: the oldest one when the queue was
    /// full, or `item` itself when the queue is closed.
    pub fn push(&self, item: T) -> Option<T> {
        if self.is_closed() {
            return Some(item);
        }

        let evicted = {
            let mut items = self.items.lock();
            let evicted = if items.len() >= self.capacity {
                items.pop_front()
            } else {
                None
            };
            items.push_back(item);
            evicted
        };

        if evicted.is_some() {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!("Ingest queue full, dropped oldest event ({} dropped so far)", total);
        }
        self.notify.notify_one();
        evicted
    }

    /// Dequeue without waiting
    pub fn try_pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Wait for the next item; `None` once closed and drained
    pub async fn pop(&self) -> Option<T> {
        loop {
            let notified = self.notify.notified();
            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            if self.is_closed() {
                return None;
            }
            notified.await;
        }
    }

    /// Stop accepting items and wake all consumers
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items evicted because the queue was full
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Counters reported when a [`ContentIndexer`] stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexerStats {
    /// Events handled without error
    pub processed: u64,
    /// Events whose ingest or removal failed
    pub failed: u64,
}

/// Background consumer feeding file events into an [`IngestService`]
pub struct ContentIndexer;

impl ContentIndexer {
    /// Run the indexer on the current runtime
    pub fn spawn(
        service: IngestService,
        queue: Arc<IngestQueue<FileEvent>>,
        cancel: CancellationToken,
    ) -> JoinHandle<IndexerStats> {
        tokio::spawn(Self::run(service, queue, cancel))
    }

    /// Process events in order until the queue closes or `cancel` fires
    pub async fn run(
        service: IngestService,
        queue: Arc<IngestQueue<FileEvent>>,
        cancel: CancellationToken,
    ) -> IndexerStats {
        tracing::info!("Content indexer started (queue capacity {})", queue.capacity());
        let mut stats = IndexerStats::default();

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = queue.pop() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match Self::handle(&service, &event, &cancel).await {
                Ok(()) => stats.processed += 1,
                Err(Error::Cancelled) => break,
                Err(e) => {
                    tracing::warn!("Failed to handle {:?}: {}", event, e);
                    stats.failed += 1;
                }
            }
        }

        tracing::info!(
            "Content indexer stopped: {} processed, {} failed, {} dropped",
            stats.processed,
            stats.failed,
            queue.dropped_count()
        );
        stats
    }

    async fn handle(
        service: &IngestService,
        event: &FileEvent,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match event {
            FileEvent::Changed(path) => {
                let report = service.index_file_with(path, cancel).await?;
                if report.cancelled {
                    return Err(Error::Cancelled);
                }
                if !report.failures.is_empty() {
                    tracing::warn!(
                        "{} of {} fragments of '{}' failed",
                        report.failures.len(),
                        report.failures.len() + report.fragment_ids.len(),
                        report.source
                    );
                }
                Ok(())
            }
            FileEvent::Removed(path) => {
                service.remove_source(&path.to_string_lossy()).await?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_drop_oldest_when_full() {
        let queue = IngestQueue::new(2).unwrap();
        assert_eq!(queue.push(1), None);
        assert_eq!(queue.push(2), None);
        assert_eq!(queue.push(3), Some(1));

        assert_eq!(queue.dropped_count(), 1);
        assert_eq!(queue.try_pop(), Some(2));
        assert_eq!(queue.try_pop(), Some(3));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(IngestQueue::<u32>::new(0).is_err());
    }

    #[test]
    fn test_push_after_close_is_refused() {
        let queue = IngestQueue::new(4).unwrap();
        queue.close();
        assert_eq!(queue.push("late"), Some("late"));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_pop_waits_then_drains_after_close() {
        let queue = Arc::new(IngestQueue::new(4).unwrap());

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(item) = queue.pop().await {
                    seen.push(item);
                }
                seen
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push(1);
        queue.push(2);
        queue.close();

        let seen = tokio::time::timeout(Duration::from_secs(5), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen, vec![1, 2]);
    }
}
