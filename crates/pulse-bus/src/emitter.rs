//! # Local Emitter
//!
//! Same-process event notification, independent of the durable path.
//!
//! This is the low-latency channel: publishes and dispatches notify
//! in-process listeners synchronously via `tokio::sync::broadcast`, without
//! retries or durability. A listener relying only on this path misses events
//! delivered to other processes; the durable topic log is the
//! at-least-once channel.
//!
//! Sends are fire-and-continue: a slow listener lags and drops events rather
//! than stalling the publish or dispatch path.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use pulse_types::Event;

/// Channel receiving every event regardless of type.
pub const WILDCARD_CHANNEL: &str = "event";

/// Events buffered per subscriber before lag drops the oldest.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// In-process fan-out over per-channel broadcast senders.
///
/// Channels are keyed by exact event type, plus the `"event"` wildcard
/// channel that observes everything.
pub struct LocalEmitter {
    channels: RwLock<HashMap<String, broadcast::Sender<Event>>>,
    capacity: usize,
}

impl LocalEmitter {
    /// Emitter with the default per-subscriber buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emitter with a custom per-subscriber buffer.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Subscribe to one channel: an exact event type, or
    /// [`WILDCARD_CHANNEL`] for everything.
    #[must_use]
    pub fn subscribe(&self, channel: &str) -> LocalSubscription {
        let mut channels = self.channels.write();
        let sender = channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);

        debug!(channel, "Local subscription created");
        LocalSubscription {
            receiver: sender.subscribe(),
        }
    }

    /// Notify the event's exact-type channel and the wildcard channel.
    ///
    /// Returns how many subscribers received it. Never blocks and never
    /// fails; events on channels nobody subscribed to are dropped.
    pub fn emit(&self, event: &Event) -> usize {
        let channels = self.channels.read();
        let mut receivers = 0;

        for channel in [event.event_type.as_str(), WILDCARD_CHANNEL] {
            if let Some(sender) = channels.get(channel) {
                receivers += sender.send(event.clone()).unwrap_or(0);
            }
        }
        receivers
    }

    /// Number of active local subscribers across all channels.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.channels
            .read()
            .values()
            .map(broadcast::Sender::receiver_count)
            .sum()
    }
}

impl Default for LocalEmitter {
    fn default() -> Self {
        Self::new()
    }
}

/// A handle for receiving locally emitted events.
pub struct LocalSubscription {
    receiver: broadcast::Receiver<Event>,
}

impl LocalSubscription {
    /// Receive the next event.
    ///
    /// Returns `None` when the emitter is gone. Lag is skipped over: a slow
    /// listener loses the oldest events rather than erroring.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Local subscriber lagged, events dropped");
                }
            }
        }
    }

    /// Receive without blocking. `Ok(None)` means no event is ready.
    pub fn try_recv(&mut self) -> Result<Option<Event>, broadcast::error::TryRecvError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Ok(Some(event)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(e @ broadcast::error::TryRecvError::Closed) => return Err(e),
            }
        }
    }
}
