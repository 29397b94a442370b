use std::fmt;
use std::sync::mpsc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::SessionKind;

/// Every session lifecycle change produces an Event.
/// Callers subscribe through [`EventBus`]; operations also return them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        kind: SessionKind,
        title: String,
        target_duration_secs: f64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        elapsed_secs: f64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        elapsed_secs: f64,
        at: DateTime<Utc>,
    },
    TimerStopped {
        kind: SessionKind,
        elapsed_secs: f64,
        at: DateTime<Utc>,
    },
    /// Pomodoro target extended.
    TimeAdded {
        added_secs: f64,
        target_duration_secs: f64,
        at: DateTime<Utc>,
    },
    /// An active session was replaced by a new start; its progress is gone.
    SessionDiscarded {
        kind: SessionKind,
        elapsed_secs: f64,
        at: DateTime<Utc>,
    },
    /// A countdown reached zero and the session was stopped automatically.
    CountdownCompleted {
        planned_duration_secs: f64,
        elapsed_secs: f64,
        title: String,
        started_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Short machine-friendly name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Event::TimerStarted { .. } => "timer_started",
            Event::TimerPaused { .. } => "timer_paused",
            Event::TimerResumed { .. } => "timer_resumed",
            Event::TimerStopped { .. } => "timer_stopped",
            Event::TimeAdded { .. } => "time_added",
            Event::SessionDiscarded { .. } => "session_discarded",
            Event::CountdownCompleted { .. } => "countdown_completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Subscriber = Box<dyn FnMut(&Event) + Send>;

/// Typed subscriber list. Delivery is synchronous, in subscription order,
/// inside the coordinator operation that produced the event.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Subscriber) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.push((id, subscriber));
        id
    }

    /// Subscribe with a channel; events are cloned into it.
    /// The subscription lapses silently once the receiver is dropped.
    pub fn subscribe_channel(&mut self) -> (SubscriptionId, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel();
        let id = self.subscribe(Box::new(move |event| {
            let _ = tx.send(event.clone());
        }));
        (id, rx)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn publish(&mut self, event: &Event) {
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
