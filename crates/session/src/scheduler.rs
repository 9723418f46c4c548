//! Debounced sync scheduling
//!
//! Local edits request a sync; the scheduler waits out a quiet period so a
//! typing burst becomes one round trip instead of one per keystroke.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Notify;

/// Trailing-edge debouncer for sync requests.
///
/// [`request`](Self::request) is cheap and callable from anywhere holding a
/// clone; a driver task awaits [`debounced`](Self::debounced) in a loop and
/// runs one sync cycle per wakeup.
#[derive(Debug, Clone)]
pub struct SyncScheduler {
    notify: Arc<Notify>,
    debounce: Duration,
}

impl SyncScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            notify: Arc::new(Notify::new()),
            debounce,
        }
    }

    /// Marks that a sync is wanted; coalesces with pending requests
    pub fn request(&self) {
        self.notify.notify_one();
    }

    /// Resolves once a request has arrived and the quiet period elapsed.
    /// Requests landing during the quiet period ride along with this
    /// wakeup rather than scheduling another.
    pub async fn debounced(&self) {
        self.notify.notified().await;
        tokio::time::sleep(self.debounce).await;
        // absorb the permit left by requests made while sleeping
        let _ = self.notify.notified().now_or_never();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_one_wakeup() {
        let scheduler = SyncScheduler::new(Duration::from_millis(100));
        scheduler.request();
        scheduler.request();
        scheduler.request();
        scheduler.debounced().await;

        // nothing left pending: the next wait must block past the window
        let next = scheduler.debounced();
        tokio::pin!(next);
        let outcome =
            tokio::time::timeout(Duration::from_millis(500), next.as_mut()).await;
        assert!(outcome.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_during_quiet_period_rides_along() {
        let scheduler = SyncScheduler::new(Duration::from_millis(100));
        let waiter = scheduler.clone();
        let handle = tokio::spawn(async move {
            waiter.debounced().await;
        });
        scheduler.request();
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.request();
        handle.await.unwrap();
    }
}
