//! Live timeline feed: a bounded, drop-oldest channel from the engine to a
//! visualization consumer.
//!
//! The tick loop must never block on a slow consumer, so a full buffer
//! discards the oldest interval to make room. Rendering is best-effort; the
//! authoritative timeline is the one in the final report.

use crate::report::ExecutionInterval;
use crossbeam_channel::{bounded, Receiver, TrySendError};

/// Producer half, held by the engine.
#[derive(Debug, Clone)]
pub struct FeedSender {
    tx: crossbeam_channel::Sender<ExecutionInterval>,
    rx: Receiver<ExecutionInterval>,
}

/// Consumer half. A plain `crossbeam_channel::Receiver`; `try_iter` drains
/// whatever has accumulated without blocking.
pub type FeedReceiver = Receiver<ExecutionInterval>;

/// Create a feed holding at most `capacity` intervals.
pub fn timeline_feed(capacity: usize) -> (FeedSender, FeedReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    (
        FeedSender {
            tx,
            rx: rx.clone(),
        },
        rx,
    )
}

impl FeedSender {
    /// Push an interval, evicting the oldest buffered one when full.
    pub fn publish(&self, interval: ExecutionInterval) {
        match self.tx.try_send(interval) {
            Ok(()) => {}
            Err(TrySendError::Full(interval)) => {
                let _ = self.rx.try_recv();
                // A concurrent consumer may have raced the eviction; losing
                // the newest interval instead is equally acceptable.
                let _ = self.tx.try_send(interval);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
