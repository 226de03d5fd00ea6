//! The single consumer of the event lanes.
//!
//! Each step drains the high-priority lane completely, then waits a short,
//! bounded time on the normal lane so a kick arriving mid-wait is picked up
//! within one wait window. Events older than the configured age are
//! discarded at dequeue time.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::Instant;

use crate::{config::TimingConfig, EventQueues, Priority, TriggerEvent};

/// Receiver of fresh events. Implementations must not block.
pub trait Dispatch {
    fn dispatch(&mut self, priority: Priority, event: TriggerEvent);
}

/// Counters accumulated by a [`Scheduler`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub high_dispatched: u64,
    pub normal_dispatched: u64,
    pub stale_discarded: u64,
}

pub struct Scheduler<D> {
    queues: Arc<EventQueues>,
    dispatcher: D,
    max_event_age: Duration,
    normal_wait: Duration,
    stats: SchedulerStats,
}

impl<D: Dispatch> Scheduler<D> {
    pub fn new(queues: Arc<EventQueues>, dispatcher: D, timing: &TimingConfig) -> Self {
        Self {
            queues,
            dispatcher,
            max_event_age: timing.max_event_age(),
            normal_wait: timing.normal_wait(),
            stats: SchedulerStats::default(),
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    pub fn into_dispatcher(self) -> D {
        self.dispatcher
    }

    /// Drains the high-priority lane without waiting. Returns how many
    /// events were dispatched.
    pub fn drain_high(&mut self) -> usize {
        let mut dispatched = 0;
        while let Some(event) = self.queues.drain_non_blocking(Priority::High) {
            if self.admit(Priority::High, event) {
                dispatched += 1;
            }
        }
        dispatched
    }

    /// One loop iteration: exhaust the high lane, then wait at most the
    /// normal wait for one normal event.
    pub async fn step(&mut self) {
        self.drain_high();
        if let Some(event) = self.queues.take(Priority::Normal, self.normal_wait).await {
            self.admit(Priority::Normal, event);
        }
    }

    /// Runs until `shutdown` resolves and returns the final counters.
    pub async fn run_until<F>(&mut self, shutdown: F) -> SchedulerStats
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            max_event_age_ms = self.max_event_age.as_millis() as u64,
            normal_wait_ms = self.normal_wait.as_millis() as u64,
            "scheduling loop started"
        );
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = self.step() => {}
            }
        }
        tracing::info!(stats = ?self.stats, "scheduling loop stopped");
        self.stats
    }

    fn admit(&mut self, priority: Priority, event: TriggerEvent) -> bool {
        let age = Instant::now().saturating_duration_since(event.observed_at);
        if age > self.max_event_age {
            self.stats.stale_discarded += 1;
            tracing::debug!(
                category = %event.category,
                %priority,
                age_ms = age.as_millis() as u64,
                "discarding stale event"
            );
            return false;
        }

        match priority {
            Priority::High => self.stats.high_dispatched += 1,
            Priority::Normal => self.stats.normal_dispatched += 1,
        }
        self.dispatcher.dispatch(priority, event);
        true
    }
}

impl<D: std::fmt::Debug> std::fmt::Debug for Scheduler<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("dispatcher", &self.dispatcher)
            .field("max_event_age", &self.max_event_age)
            .field("normal_wait", &self.normal_wait)
            .field("stats", &self.stats)
            .finish()
    }
}
