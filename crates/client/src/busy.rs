//! Process-wide busy indicator.
//!
//! Every backend call holds a [`BusyGuard`] for its duration. The indicator
//! counts guards, so overlapping calls keep it active until the last one
//! finishes, and dropping the guard releases it on every exit path including
//! errors and cancelled futures.

use std::sync::Arc;

use tokio::sync::watch;

/// Reference-counted "request in flight" indicator.
#[derive(Debug, Clone)]
pub struct BusyIndicator {
    in_flight: Arc<watch::Sender<usize>>,
}

impl BusyIndicator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            in_flight: Arc::new(tx),
        }
    }

    /// Mark one call as in flight until the returned guard is dropped.
    #[must_use = "the indicator is released as soon as the guard is dropped"]
    pub fn enter(&self) -> BusyGuard {
        self.in_flight.send_modify(|n| *n += 1);
        BusyGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Number of calls currently in flight.
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight() > 0
    }

    /// Observe the in-flight count. `is_busy` is `count > 0`.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.in_flight.subscribe()
    }
}

impl Default for BusyIndicator {
    fn default() -> Self {
        Self::new()
    }
}

/// Held for the duration of one backend call.
#[derive(Debug)]
pub struct BusyGuard {
    in_flight: Arc<watch::Sender<usize>>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }
}
