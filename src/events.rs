//! In-process event bus (§6.3): best-effort broadcast to optional
//! collaborators (overlays). Failures in subscribers never affect a review.

use crate::checks::Issue;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ReviewStarted { url: String, session_id: String, spec: String },
    ReviewIssueFound { issue: Issue },
    ReviewCompleted { session_id: String, summary: serde_json::Value, pillar_grades: serde_json::Value },
    CaptureModeChanged { enabled: bool },
}

type Subscriber = Box<dyn Fn(&Event) + Send + Sync>;

/// Holds subscribers and emits events in spec order, at-least-once,
/// catching panics so one misbehaving subscriber can't take down a review.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventBus {
    pub fn subscribe(&self, subscriber: impl Fn(&Event) + Send + Sync + 'static) {
        self.subscribers.lock().expect("event bus lock poisoned").push(Box::new(subscriber));
    }

    pub fn emit(&self, event: Event) {
        let subscribers = self.subscribers.lock().expect("event bus lock poisoned");
        for subscriber in subscribers.iter() {
            if catch_unwind(AssertUnwindSafe(|| subscriber(&event))).is_err() {
                tracing::warn!("event subscriber panicked handling {:?}", event_name(&event));
            }
        }
    }
}

fn event_name(event: &Event) -> &'static str {
    match event {
        Event::ReviewStarted { .. } => "review.started",
        Event::ReviewIssueFound { .. } => "review.issue_found",
        Event::ReviewCompleted { .. } => "review.completed",
        Event::CaptureModeChanged { .. } => "capture_mode.changed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn subscribers_receive_events_in_order() {
        let bus = EventBus::default();
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        bus.subscribe(move |event| received_clone.lock().unwrap().push(event_name(event)));

        bus.emit(Event::ReviewStarted { url: "x".into(), session_id: "s".into(), spec: "default".into() });
        bus.emit(Event::ReviewCompleted {
            session_id: "s".into(),
            summary: serde_json::json!({}),
            pillar_grades: serde_json::json!({}),
        });

        let log = received.lock().unwrap();
        assert_eq!(*log, vec!["review.started", "review.completed"]);
    }

    #[test]
    fn panicking_subscriber_does_not_stop_others() {
        let bus = EventBus::default();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        bus.subscribe(|_| panic!("boom"));
        bus.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(Event::CaptureModeChanged { enabled: true });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
