use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub event: String,
    pub payload: JsonValue,
}

pub trait NotificationSink {
    fn send(&self, event: &str, payload: JsonValue);
}

impl<F> NotificationSink for F
where
    F: Fn(&str, JsonValue),
{
    fn send(&self, event: &str, payload: JsonValue) {
        self(event, payload)
    }
}

impl NotificationSink for UnboundedSender<Notification> {
    fn send(&self, event: &str, payload: JsonValue) {
        // A closed receiver means the client went away; drop the event.
        let _ = UnboundedSender::send(
            self,
            Notification {
                event: event.to_string(),
                payload,
            },
        );
    }
}

/// Buffers notifications in order; clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    events: Rc<RefCell<Vec<Notification>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl NotificationSink for CollectingSink {
    fn send(&self, event: &str, payload: JsonValue) {
        self.events.borrow_mut().push(Notification {
            event: event.to_string(),
            payload,
        });
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn send(&self, _event: &str, _payload: JsonValue) {}
}
