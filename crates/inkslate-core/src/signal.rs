//! Single-writer, many-reader signal channels.

use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

/// Per-subscriber queue depth.
pub const DEFAULT_CAPACITY: usize = 16;

/// Publishes values to every live subscriber over bounded channels.
///
/// A subscriber that falls behind loses new values instead of blocking the publisher.
/// Dropped subscribers are pruned on the next publish.
pub struct Broadcast<T: Clone + Send> {
    subscribers: Mutex<Vec<SyncSender<T>>>,
    capacity: usize,
}

impl<T: Clone + Send> Default for Broadcast<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl<T: Clone + Send> Broadcast<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = mpsc::sync_channel(self.capacity);
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    pub fn publish(&self, value: T) {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return;
        };
        subscribers.retain(|tx| match tx.try_send(value.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("Signal subscriber is lagging; dropping value");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_receives() {
        let signal = Broadcast::default();
        let a = signal.subscribe();
        let b = signal.subscribe();
        signal.publish(7u32);
        assert_eq!(a.try_recv().unwrap(), 7);
        assert_eq!(b.try_recv().unwrap(), 7);
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let signal = Broadcast::default();
        let rx = signal.subscribe();
        drop(signal.subscribe());
        signal.publish("x");
        assert_eq!(signal.subscriber_count(), 1);
        assert_eq!(rx.try_recv().unwrap(), "x");
    }

    #[test]
    fn test_full_queue_never_blocks() {
        let signal = Broadcast::with_capacity(1);
        let rx = signal.subscribe();
        signal.publish(1);
        signal.publish(2);
        assert_eq!(rx.try_recv().unwrap(), 1);
        assert!(rx.try_recv().is_err());
    }
}
