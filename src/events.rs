#![forbid(unsafe_code)]

use tokio::sync::broadcast;
use tracing::debug;

const BUS_CAPACITY: usize = 16;

/// Why dependent views should reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    VideoSaved,
    VideosDeleted,
    Manual,
}

/// Fan-out of "the library changed" notifications. Views subscribe instead of
/// being poked directly by whoever changed the data.
#[derive(Debug, Clone)]
pub struct RefreshBus {
    tx: broadcast::Sender<RefreshReason>,
}

impl Default for RefreshBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshReason> {
        self.tx.subscribe()
    }

    /// Returns how many subscribers were notified.
    pub fn publish(&self, reason: RefreshReason) -> usize {
        let delivered = self.tx.send(reason).unwrap_or(0);
        debug!(?reason, delivered, "library refresh published");
        delivered
    }
}
