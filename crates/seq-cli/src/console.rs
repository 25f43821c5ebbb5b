use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use seq_core::SeqValue;
use seq_engine::EventSink;

/// Prints interpreter events to stdout and keeps a failure count so the
/// process can exit non-zero when any step failed.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    failures: AtomicUsize,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
}

impl EventSink for ConsoleSink {
    fn on_output(&self, message: &str) {
        println!("{}", message);
    }

    fn on_vars(&self, vars: &BTreeMap<String, SeqValue>) {
        let rendered = serde_json::to_string(vars).unwrap_or_else(|_| "{}".to_string());
        println!("vars: {}", rendered);
    }

    fn on_status(&self, step_index: usize, success: bool) {
        if !success {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        println!(
            "step {}: {}",
            step_index + 1,
            if success { "PASS" } else { "FAIL" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_count_tracks_statuses() {
        let sink = ConsoleSink::new();
        sink.on_status(0, true);
        sink.on_status(1, false);
        sink.on_status(2, false);
        assert_eq!(sink.failures(), 2);
    }
}
