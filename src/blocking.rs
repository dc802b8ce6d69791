//! Bounded offload of blocking work (image codecs, archive extraction, file writes)

use crate::error::{Error, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::spawn_blocking;

/// A fixed-size pool for blocking closures
///
/// Each call to [`BlockingPool::run`] holds one permit for the duration of the
/// closure, so at most `size` blocking operations run at once no matter how
/// many workers submit them.
#[derive(Clone, Debug)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl BlockingPool {
    /// Create a pool running at most `size` closures at once (minimum 1)
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Configured pool size
    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `f` on a blocking thread once a permit is available
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::Other("blocking pool closed".into()))?;

        spawn_blocking(f)
            .await
            .map_err(|e| Error::Other(format!("blocking task panicked: {}", e)))?
    }
}
