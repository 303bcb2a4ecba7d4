//! Per-poll write serialization for the in-process gateway.
//!
//! Writes to the same poll run one at a time, in arrival order at the lock.
//! Writes to different polls run in parallel, bounded by a global semaphore.
//! A write takes its poll's lock before a permit, so writes queued behind a
//! busy poll never hold permits another poll needs. The ledger call itself
//! runs on the blocking pool.

use crate::EngineError;
use qvote_types::PollId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};

pub struct PollWriter {
    poll_locks: Mutex<HashMap<PollId, Arc<Mutex<()>>>>,
    max_concurrent: usize,
    semaphore: Semaphore,
}

impl PollWriter {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            poll_locks: Mutex::new(HashMap::new()),
            max_concurrent,
            semaphore: Semaphore::new(max_concurrent),
        }
    }

    async fn poll_lock(&self, poll: &PollId) -> Arc<Mutex<()>> {
        let mut locks = self.poll_locks.lock().await;
        Arc::clone(locks.entry(*poll).or_default())
    }

    /// Run `write` with `poll`'s lock held.
    pub async fn run<F, R>(&self, poll: &PollId, write: F) -> Result<R, EngineError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let lock = self.poll_lock(poll).await;
        let result = async {
            let _guard = lock.lock().await;
            let _permit = self
                .semaphore
                .acquire()
                .await
                .map_err(|e| EngineError::Task(e.to_string()))?;
            tokio::task::spawn_blocking(write)
                .await
                .map_err(|e| EngineError::Task(e.to_string()))
        }
        .await;

        drop(lock);
        self.release(poll).await;
        result
    }

    /// Forget `poll`'s lock once no write holds or waits on it.
    async fn release(&self, poll: &PollId) {
        let mut locks = self.poll_locks.lock().await;
        let idle = locks.get(poll).is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(poll);
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Polls with a write running or queued.
    pub async fn tracked_polls(&self) -> usize {
        self.poll_locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{Duration, Instant};

    fn poll(n: u8) -> PollId {
        PollId::new([n; 32])
    }

    #[tokio::test]
    async fn returns_the_write_result() {
        let writer = PollWriter::new(4);
        assert_eq!(writer.run(&poll(1), || 42).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn different_polls_run_in_parallel() {
        let writer = Arc::new(PollWriter::new(4));
        let start = Instant::now();
        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let w = Arc::clone(&writer);
                tokio::spawn(async move {
                    w.run(&poll(i), move || {
                        std::thread::sleep(Duration::from_millis(50));
                        i
                    })
                    .await
                })
            })
            .collect();

        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap().unwrap());
        }
        let elapsed = start.elapsed();
        assert!(elapsed < Duration::from_millis(200), "expected parallel writes, took {elapsed:?}");
        results.sort();
        assert_eq!(results, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn same_poll_is_serialized() {
        let writer = Arc::new(PollWriter::new(4));
        let inside = Arc::new(AtomicU64::new(0));
        let max_seen = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let w = Arc::clone(&writer);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                tokio::spawn(async move {
                    w.run(&poll(7), move || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(10));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn idle_locks_are_dropped() {
        let writer = PollWriter::new(2);
        writer.run(&poll(1), || ()).await.unwrap();
        writer.run(&poll(2), || ()).await.unwrap();
        assert_eq!(writer.tracked_polls().await, 0);
        assert_eq!(writer.max_concurrent(), 2);
    }

    #[tokio::test]
    async fn busy_poll_does_not_starve_other_polls() {
        let writer = Arc::new(PollWriter::new(2));
        let hot: Vec<_> = (0..2)
            .map(|_| {
                let w = Arc::clone(&writer);
                tokio::spawn(async move {
                    w.run(&poll(1), || std::thread::sleep(Duration::from_millis(300)))
                        .await
                })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(writer.tracked_polls().await, 1);

        let start = Instant::now();
        writer.run(&poll(2), || ()).await.unwrap();
        let waited = start.elapsed();
        assert!(waited < Duration::from_millis(100), "cold poll waited {waited:?}");

        for h in hot {
            h.await.unwrap().unwrap();
        }
        assert_eq!(writer.tracked_polls().await, 0);
    }
}
