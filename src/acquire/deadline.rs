//! Single deadline over the whole acquisition loop.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{AcquireError, Result};

#[derive(Debug, Clone, Copy)]
pub struct DeadlineGuard {
    duration: Duration,
}

impl DeadlineGuard {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Run `work` until it settles or the deadline passes, whichever is first.
    ///
    /// The timer lives inside the returned future and is dropped with it, so
    /// it never outlives the race. On expiry `work` is dropped mid-flight.
    pub async fn race<F, T>(&self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.duration, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.duration.as_millis() as u64, "Acquisition deadline expired");
                Err(AcquireError::timeout())
            }
        }
    }
}
