//! Bounded pool for receipt callbacks.
//!
//! Callbacks run on the blocking thread pool, at most `size` at a time, so
//! a slow or panicking callback never holds up the scan that found its
//! receipt.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use crate::GatewayError;

#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
    handle: Handle,
}

impl WorkerPool {
    /// A pool running on the current Tokio runtime. A size of zero is raised to one.
    pub fn new(size: usize) -> Result<Self, GatewayError> {
        let handle = Handle::try_current().map_err(|e| GatewayError::internal(&e))?;
        Ok(Self::with_handle(size, handle))
    }

    pub fn with_handle(size: usize, handle: Handle) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
            handle,
        }
    }

    /// Queue `job`. Returns at once; the job runs when a worker is free.
    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        self.handle.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                tracing::warn!("worker pool closed, dropping callback");
                return;
            };
            if let Err(e) = tokio::task::spawn_blocking(job).await {
                if e.is_panic() {
                    let err = GatewayError::from_panic(e.into_panic());
                    tracing::error!(error = %err, "receipt callback panicked");
                } else {
                    tracing::error!(error = %e, "receipt callback cancelled");
                }
            }
        });
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn dispatched_job_runs() {
        let pool = WorkerPool::new(2).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        pool.dispatch(move || {
            let _ = tx.send(42);
        });
        assert_eq!(rx.recv().await, Some(42));
    }

    #[tokio::test]
    async fn zero_size_is_raised_to_one() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.size(), 1);
    }

    #[tokio::test]
    async fn panicking_job_does_not_poison_the_pool() {
        let pool = WorkerPool::new(1).unwrap();
        pool.dispatch(|| panic!("callback failed"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        pool.dispatch(move || {
            let _ = tx.send(());
        });
        assert_eq!(rx.recv().await, Some(()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_is_bounded() {
        let pool = WorkerPool::new(2).unwrap();
        let running = Arc::new(AtomicU64::new(0));
        let max_seen = Arc::new(AtomicU64::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();

        for _ in 0..6 {
            let running = Arc::clone(&running);
            let max_seen = Arc::clone(&max_seen);
            let tx = tx.clone();
            pool.dispatch(move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                running.fetch_sub(1, Ordering::SeqCst);
                let _ = tx.send(());
            });
        }
        for _ in 0..6 {
            rx.recv().await.unwrap();
        }
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }
}
