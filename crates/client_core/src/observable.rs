//! Latest-value broadcast shared by the stores.
//!
//! A [`Subscription`] first yields the snapshot current at subscribe time and
//! then every published snapshot in publish order.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt,
};
use tracing::warn;

const FEED_CAPACITY: usize = 256;

pub struct Observable<T> {
    latest: Mutex<T>,
    feed: broadcast::Sender<T>,
}

impl<T: Clone + Send + 'static> Observable<T> {
    pub fn new(initial: T) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            latest: Mutex::new(initial),
            feed,
        }
    }

    pub fn current(&self) -> T {
        self.latest().clone()
    }

    pub fn publish(&self, value: T) {
        let mut latest = self.latest();
        *latest = value.clone();
        // No receivers is fine; the value is still readable via `current`.
        let _ = self.feed.send(value);
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let latest = self.latest();
        Subscription {
            pending: Some(latest.clone()),
            rx: self.feed.subscribe(),
        }
    }

    fn latest(&self) -> MutexGuard<'_, T> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct Subscription<T> {
    pending: Option<T>,
    rx: broadcast::Receiver<T>,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    /// Waits for the next snapshot. `None` once the observable is dropped.
    pub async fn next(&mut self) -> Option<T> {
        if let Some(value) = self.pending.take() {
            return Some(value);
        }
        loop {
            match self.rx.recv().await {
                Ok(value) => return Some(value),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("observable: subscriber lagged, skipped {skipped} snapshots");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next snapshot if one is already queued.
    pub fn try_next(&mut self) -> Option<T> {
        if let Some(value) = self.pending.take() {
            return Some(value);
        }
        loop {
            match self.rx.try_recv() {
                Ok(value) => return Some(value),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("observable: subscriber lagged, skipped {skipped} snapshots");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = T> + Send {
        tokio_stream::iter(self.pending).chain(BroadcastStream::new(self.rx).filter_map(
            |item| match item {
                Ok(value) => Some(value),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!("observable: stream lagged, skipped {skipped} snapshots");
                    None
                }
            },
        ))
    }
}
