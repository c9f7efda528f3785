// ── Sensor subscriptions ──
//
// One `SensorStream` per observer. Every observer reads the same shared
// `Arc<Feed>`; none of them can block the poller or each other.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::{SensorSet, SensorUpdate};
use crate::store::Feed;

/// A subscription to the published feed.
///
/// Provides point-in-time access and change notification via
/// [`changed()`](Self::changed) or by converting into a `Stream`.
pub struct SensorStream {
    current: Arc<Feed>,
    receiver: watch::Receiver<Arc<Feed>>,
    sensors: SensorSet,
    installation_id: u64,
}

impl SensorStream {
    pub(crate) fn new(
        receiver: watch::Receiver<Arc<Feed>>,
        sensors: SensorSet,
        installation_id: u64,
    ) -> Self {
        let current = receiver.borrow().clone();
        Self {
            current,
            receiver,
            sensors,
            installation_id,
        }
    }

    /// The feed captured at creation time or by the last `changed()`.
    pub fn current(&self) -> &Arc<Feed> {
        &self.current
    }

    /// The latest feed (may have changed since creation).
    pub fn latest(&self) -> Arc<Feed> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next publication. Returns `None` once the poller is gone.
    pub async fn changed(&mut self) -> Option<Arc<Feed>> {
        self.receiver.changed().await.ok()?;
        let feed = self.receiver.borrow_and_update().clone();
        self.current = feed.clone();
        Some(feed)
    }

    /// Per-sensor updates for [`current()`](Self::current).
    pub fn updates(&self) -> Vec<SensorUpdate> {
        self.current
            .sensor_updates(&self.sensors, self.installation_id)
    }

    /// Wait for the next publication and return its sensor updates.
    pub async fn next_updates(&mut self) -> Option<Vec<SensorUpdate>> {
        self.changed().await?;
        Some(self.updates())
    }

    /// Convert into a `Stream` of feeds, starting with the current one.
    pub fn into_stream(self) -> FeedWatchStream {
        FeedWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct FeedWatchStream {
    inner: WatchStream<Arc<Feed>>,
}

impl Stream for FeedWatchStream {
    type Item = Arc<Feed>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
