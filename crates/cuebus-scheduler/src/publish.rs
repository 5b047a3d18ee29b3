use std::collections::BTreeMap;
use std::sync::Arc;

use cuebus_core::{Group, GroupId, Target, TimerState};
use serde::Serialize;
use tokio::sync::watch;

/// Full structural snapshot pushed on the `state` feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub groups: Vec<Group>,
    pub targets: Vec<Target>,
}

/// Timer view pushed on the `timers` feed, keyed by group id.
pub type TimersSnapshot = BTreeMap<GroupId, TimerState>;

/// Last-value-wins broadcast of one snapshot type.
///
/// A subscriber sees the current value immediately and only the latest value
/// after that; there is no replay of values it was too slow to observe.
/// Dropping the receiver unsubscribes.
#[derive(Debug)]
pub struct Feed<T> {
    tx: watch::Sender<Arc<T>>,
}

impl<T> Feed<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(Arc::new(initial));
        Self { tx }
    }

    /// Replace the current value and wake every subscriber.
    pub fn publish(&self, value: T) {
        self.tx.send_replace(Arc::new(value));
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<T>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Arc<T> {
        self.tx.borrow().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// The two feeds the engine publishes to.
#[derive(Debug)]
pub struct Publisher {
    pub state: Feed<StateSnapshot>,
    pub timers: Feed<TimersSnapshot>,
}

impl Publisher {
    pub fn new(state: StateSnapshot, timers: TimersSnapshot) -> Self {
        Self {
            state: Feed::new(state),
            timers: Feed::new(timers),
        }
    }
}
