use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Per-car broadcast of committed events.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to events of one car. Creates the channel if needed.
    pub fn subscribe(&self, car_id: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(car_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// No-op if nobody is listening. A channel whose receivers are all gone
    /// is dropped here.
    pub fn send(&self, car_id: Ulid, event: &Event) {
        let Some(sender) = self.channels.get(&car_id).map(|s| s.clone()) else {
            return;
        };
        if sender.send(event.clone()).is_err() {
            // Re-checked under the shard lock: `subscribe` may have just re-armed it.
            self.channels.remove_if(&car_id, |_, s| s.receiver_count() == 0);
        }
    }
}
