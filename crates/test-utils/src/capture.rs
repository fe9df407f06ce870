use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// One captured log event.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
}

/// A `tracing` layer that keeps every event's level and message in memory,
/// so tests can assert on what was logged.
///
/// Hand [`CapturedLogs::dispatch`] to the code under test (e.g.
/// `ShutdownSequence::with_dispatch`) and inspect the records afterwards.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl CapturedLogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&self) -> Dispatch {
        Dispatch::new(tracing_subscriber::registry().with(self.clone()))
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.message).collect()
    }

    /// Number of events whose message contains `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.records()
            .iter()
            .filter(|r| r.message.contains(needle))
            .count()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.count(needle) > 0
    }

    pub fn contains_at(&self, level: Level, needle: &str) -> bool {
        self.records()
            .iter()
            .any(|r| r.level == level && r.message.contains(needle))
    }
}

impl<S: Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.records.lock().unwrap().push(LogRecord {
            level: *event.metadata().level(),
            message: visitor.message,
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}
