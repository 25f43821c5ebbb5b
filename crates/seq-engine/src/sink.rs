use std::collections::BTreeMap;
use std::sync::Mutex;

use seq_core::SeqValue;

/// Fire-and-forget observation callbacks. The interpreter never reads
/// anything back from a sink, so implementations cannot influence control
/// flow.
pub trait EventSink: Send + Sync {
    fn on_output(&self, _message: &str) {}
    fn on_vars(&self, _vars: &BTreeMap<String, SeqValue>) {}
    fn on_status(&self, _step_index: usize, _success: bool) {}
}

#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Output(String),
    Vars(BTreeMap<String, SeqValue>),
    Status { step_index: usize, success: bool },
}

/// Collects every event in order, for tests and inspection tooling.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn outputs(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Output(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<(usize, bool)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Status {
                    step_index,
                    success,
                } => Some((step_index, success)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: SinkEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl EventSink for RecordingSink {
    fn on_output(&self, message: &str) {
        self.push(SinkEvent::Output(message.to_string()));
    }

    fn on_vars(&self, vars: &BTreeMap<String, SeqValue>) {
        self.push(SinkEvent::Vars(vars.clone()));
    }

    fn on_status(&self, step_index: usize, success: bool) {
        self.push(SinkEvent::Status {
            step_index,
            success,
        });
    }
}
