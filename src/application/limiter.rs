//! Caps the number of render sessions alive at once.

use std::{num::NonZeroUsize, sync::Arc};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::application::engine::RenderEngineError;

/// Counting semaphore shared by every conversion of one service instance.
#[derive(Debug, Clone)]
pub struct RenderLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl RenderLimiter {
    pub fn new(capacity: NonZeroUsize) -> Self {
        let capacity = capacity.get();
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a free slot. The slot is returned when the permit drops,
    /// including when the waiting or holding future is cancelled.
    pub async fn acquire(&self) -> Result<RenderPermit, RenderEngineError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| RenderEngineError::internal("render limiter closed"))?;
        Ok(RenderPermit { _permit: permit })
    }
}

#[derive(Debug)]
pub struct RenderPermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn limiter(capacity: usize) -> RenderLimiter {
        RenderLimiter::new(NonZeroUsize::new(capacity).expect("non-zero capacity"))
    }

    #[tokio::test]
    async fn permits_are_returned_on_drop() {
        let limiter = limiter(2);

        let first = limiter.acquire().await.expect("first permit");
        let second = limiter.acquire().await.expect("second permit");
        assert_eq!(limiter.available(), 0);

        drop(first);
        assert_eq!(limiter.available(), 1);
        drop(second);
        assert_eq!(limiter.available(), limiter.capacity());
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_block_until_release() {
        let limiter = limiter(1);
        let held = limiter.acquire().await.expect("permit");

        let blocked = tokio::time::timeout(Duration::from_millis(50), limiter.acquire()).await;
        assert!(blocked.is_err(), "second acquire should wait");

        drop(held);
        let next = tokio::time::timeout(Duration::from_millis(50), limiter.acquire()).await;
        assert!(next.is_ok(), "slot should be free after release");
    }

    #[tokio::test]
    async fn cancelled_holder_releases_slot() {
        let limiter = limiter(1);
        let task_limiter = limiter.clone();

        let task = tokio::spawn(async move {
            let _permit = task_limiter.acquire().await.expect("permit");
            std::future::pending::<()>().await;
        });
        while limiter.available() != 0 {
            tokio::task::yield_now().await;
        }

        task.abort();
        let _ = task.await;
        assert_eq!(limiter.available(), 1);
    }
}
