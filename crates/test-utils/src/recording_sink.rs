use std::sync::{Arc, Mutex};

use concierge::output::{OutputSink, SupervisorEvent};
use concierge::types::RenderMode;

/// An output sink that remembers everything it was given.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    lines: Arc<Mutex<Vec<(String, RenderMode, String)>>>,
    closed: Arc<Mutex<Vec<(String, RenderMode)>>>,
    events: Arc<Mutex<Vec<SupervisorEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines received for `unit` in `mode`, in arrival order.
    pub fn lines_for(&self, unit: &str, mode: RenderMode) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, m, _)| u == unit && *m == mode)
            .map(|(_, _, line)| line.clone())
            .collect()
    }

    /// Streams of `unit` that reached EOF.
    pub fn closed_for(&self, unit: &str) -> Vec<RenderMode> {
        self.closed
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == unit)
            .map(|(_, m)| *m)
            .collect()
    }

    pub fn events(&self) -> Vec<SupervisorEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl OutputSink for RecordingSink {
    fn line(&self, unit: &str, mode: RenderMode, line: &str) {
        self.lines
            .lock()
            .unwrap()
            .push((unit.to_string(), mode, line.to_string()));
    }

    fn closed(&self, unit: &str, mode: RenderMode) {
        self.closed.lock().unwrap().push((unit.to_string(), mode));
    }

    fn event(&self, event: &SupervisorEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
