//! Trailing-edge debouncing of raw events

use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

/// A batch is flushed after at most this many windows even if events keep
/// arriving
pub const MAX_BATCH_AGE_WINDOWS: u32 = 10;

/// Groups events separated by less than one window into a single batch
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    window: Duration,
    max_age: Duration,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            max_age: window.saturating_mul(MAX_BATCH_AGE_WINDOWS),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Wait for the next batch.
    ///
    /// The batch opens with the first received event and closes once no event
    /// arrived for a full window, once it reaches the maximum age, or when the
    /// channel closes. Returns `None` when the channel is closed and drained.
    pub async fn next_batch<T>(&self, rx: &mut UnboundedReceiver<T>) -> Option<Vec<T>> {
        let first = rx.recv().await?;
        let deadline = Instant::now() + self.max_age;
        let mut batch = vec![first];

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let wait = self.window.min(deadline - now);
            match tokio::time::timeout(wait, rx.recv()).await {
                Ok(Some(event)) => batch.push(event),
                Ok(None) | Err(_) => break,
            }
        }

        Some(batch)
    }
}
