//! Bounded memory of recently processed event ids.
//!
//! The hub delivers at least once, so an `eventId` can come back in a later
//! batch. Ids are remembered only after their batch has been flushed; a batch
//! that fails to deliver is therefore processed again in full on redelivery.
//! Oldest ids are evicted first once `capacity` is reached.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use medsupply_core::EventId;

#[derive(Debug, Default)]
struct Window {
    seen: HashSet<EventId>,
    order: VecDeque<EventId>,
}

#[derive(Debug)]
pub struct RecentEvents {
    capacity: usize,
    window: Mutex<Window>,
}

impl RecentEvents {
    /// A capacity of 0 remembers nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            window: Mutex::new(Window::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.window.lock().map(|w| w.order.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, event_id: &EventId) -> bool {
        self.window
            .lock()
            .map(|w| w.seen.contains(event_id))
            .unwrap_or(false)
    }

    pub fn mark_all<'a>(&self, event_ids: impl IntoIterator<Item = &'a EventId>) {
        if self.capacity == 0 {
            return;
        }
        let mut window = match self.window.lock() {
            Ok(window) => window,
            Err(poisoned) => poisoned.into_inner(),
        };

        for id in event_ids {
            if !window.seen.insert(id.clone()) {
                continue;
            }
            window.order.push_back(id.clone());
            while window.order.len() > self.capacity {
                if let Some(evicted) = window.order.pop_front() {
                    window.seen.remove(&evicted);
                }
            }
        }
    }
}
