use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertEvent {
    Activated {
        row: usize,
        col: usize,
        count: f64,
        capacity: u32,
        timestamp: DateTime<Utc>,
    },
    Cleared {
        row: usize,
        col: usize,
    },
}

impl AlertEvent {
    #[inline]
    pub fn cell(&self) -> (usize, usize) {
        match *self {
            AlertEvent::Activated { row, col, .. } | AlertEvent::Cleared { row, col } => (row, col),
        }
    }

    #[inline]
    pub fn is_activation(&self) -> bool {
        matches!(self, AlertEvent::Activated { .. })
    }
}

/// Receives every alert transition exactly once.
pub trait AlertSink {
    fn on_event(&mut self, event: &AlertEvent);
}

impl<F: FnMut(&AlertEvent)> AlertSink for F {
    #[inline]
    fn on_event(&mut self, event: &AlertEvent) {
        self(event)
    }
}

impl AlertSink for Vec<AlertEvent> {
    #[inline]
    fn on_event(&mut self, event: &AlertEvent) {
        self.push(event.clone());
    }
}
