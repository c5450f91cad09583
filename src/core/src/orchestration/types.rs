use serde::{Deserialize, Serialize};

/// Records currently held per stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamCounts {
    pub events: usize,
    pub console: usize,
    pub network: usize,
    pub keyboard: usize,
}

impl StreamCounts {
    pub fn total(&self) -> usize {
        self.events + self.console + self.network + self.keyboard
    }
}

/// Read-only view of an orchestrator.
///
/// `window_elapsed` is the age, in milliseconds, of the oldest trace event
/// still buffered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureState {
    pub active: bool,
    pub started_at: Option<i64>,
    pub window_elapsed: i64,
    pub counts: StreamCounts,
}
