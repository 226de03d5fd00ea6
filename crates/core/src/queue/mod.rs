//! Bounded, drop-oldest event lanes shared between the trigger thread and
//! the scheduling loop.

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use parking_lot::Mutex;
use tokio::{sync::Notify, time::Instant};

use crate::{config::QueueConfig, Priority, TriggerEvent};

/// A single bounded FIFO lane. Offering to a full lane evicts the oldest
/// entry; the producer never waits.
#[derive(Debug)]
pub struct BoundedLane {
    capacity: usize,
    events: Mutex<VecDeque<TriggerEvent>>,
    notify: Notify,
    evicted: AtomicU64,
}

impl BoundedLane {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            evicted: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Number of events dropped to make room since the lane was created.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Appends an event, evicting the oldest one first when the lane is full.
    /// Returns the evicted event, if any.
    pub fn offer(&self, event: TriggerEvent) -> Option<TriggerEvent> {
        let dropped = {
            let mut events = self.events.lock();
            let dropped = if events.len() >= self.capacity {
                events.pop_front()
            } else {
                None
            };
            events.push_back(event);
            dropped
        };
        if dropped.is_some() {
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        self.notify.notify_one();
        dropped
    }

    /// Removes and returns the oldest event without waiting.
    pub fn try_take(&self) -> Option<TriggerEvent> {
        self.events.lock().pop_front()
    }

    /// Waits at most `timeout` for an event to become available.
    pub async fn take(&self, timeout: Duration) -> Option<TriggerEvent> {
        // `None` when the deadline lies past what the clock can represent.
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if let Some(event) = self.try_take() {
                return Some(event);
            }
            // A permit stored by `offer` between the check above and this
            // await wakes us immediately.
            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, self.notify.notified())
                        .await
                        .is_err()
                    {
                        return self.try_take();
                    }
                }
                None => self.notify.notified().await,
            }
        }
    }

    /// Snapshot of the queued events, oldest first.
    pub fn snapshot(&self) -> Vec<TriggerEvent> {
        self.events.lock().iter().copied().collect()
    }
}

/// The high and normal priority lanes.
#[derive(Debug)]
pub struct EventQueues {
    lanes: [BoundedLane; 2],
}

impl EventQueues {
    pub fn new(high_capacity: usize, normal_capacity: usize) -> Self {
        Self {
            lanes: [
                BoundedLane::new(high_capacity),
                BoundedLane::new(normal_capacity),
            ],
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.high_priority_capacity, config.normal_priority_capacity)
    }

    pub fn lane(&self, priority: Priority) -> &BoundedLane {
        &self.lanes[priority.index()]
    }

    /// Producer entry point. Safe to call from any thread; never blocks
    /// beyond the short critical section of the lane mutex.
    pub fn offer(&self, priority: Priority, event: TriggerEvent) {
        if let Some(dropped) = self.lane(priority).offer(event) {
            tracing::debug!(
                %priority,
                category = %dropped.category,
                "lane full, evicted oldest event"
            );
        }
    }

    /// Routes an event into the lane chosen by its category.
    pub fn offer_event(&self, event: TriggerEvent) {
        self.offer(event.priority(), event);
    }

    pub fn drain_non_blocking(&self, priority: Priority) -> Option<TriggerEvent> {
        self.lane(priority).try_take()
    }

    pub async fn take(&self, priority: Priority, timeout: Duration) -> Option<TriggerEvent> {
        self.lane(priority).take(timeout).await
    }
}

impl Default for EventQueues {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}
