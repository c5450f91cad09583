//! Trace stream: adapter around the external DOM/interaction recorder.
//!
//! The external recorder is reached through [`TraceSource`]. Hosts that drive
//! the recorder themselves can use [`FeedTraceSource`] and push its events
//! through the [`TraceFeed`] handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info};
use serde_json::Value;

use super::clock::Clock;
use super::recorder::{EventSink, Recorder, SinkSlot};
use super::types::TraceEvent;
use crate::error_handling::types::CaptureError;

/// Options handed to the external recorder when it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceOptions {
    /// Elements matching this selector are recorded as opaque blocks.
    pub block_selector: String,
    pub mask_password_inputs: bool,
    pub scroll_sampling_ms: u64,
    pub media_sampling_ms: u64,
    pub record_canvas: bool,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            block_selector: "iframe, canvas, video, [data-bugstream-block]".to_string(),
            mask_password_inputs: true,
            scroll_sampling_ms: 300,
            media_sampling_ms: 500,
            record_canvas: false,
        }
    }
}

/// The external DOM/interaction recorder.
pub trait TraceSource: Send {
    fn start(&mut self, sink: EventSink<TraceEvent>, options: &TraceOptions)
        -> Result<(), CaptureError>;
    fn stop(&mut self);
    /// Asks the recorder to emit a fresh full snapshot of the page.
    fn take_full_snapshot(&mut self) -> Result<(), CaptureError>;
}

pub struct TraceRecorder {
    source: Box<dyn TraceSource>,
    options: TraceOptions,
    active: bool,
}

impl TraceRecorder {
    pub fn new(source: Box<dyn TraceSource>) -> Self {
        Self::with_options(source, TraceOptions::default())
    }

    pub fn with_options(source: Box<dyn TraceSource>, options: TraceOptions) -> Self {
        Self {
            source,
            options,
            active: false,
        }
    }

    /// Requests a full snapshot. Does nothing while stopped.
    pub fn resync(&mut self) -> Result<(), CaptureError> {
        if !self.active {
            debug!("trace recorder not active, skipping resync");
            return Ok(());
        }
        self.source.take_full_snapshot()
    }
}

impl Recorder for TraceRecorder {
    type Record = TraceEvent;

    fn start(&mut self, sink: EventSink<TraceEvent>) -> Result<(), CaptureError> {
        if self.active {
            debug!("trace recorder already active");
            return Ok(());
        }
        self.source.start(sink, &self.options)?;
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.active {
            self.source.stop();
            self.active = false;
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// [`TraceSource`] fed by the host through a [`TraceFeed`].
pub struct FeedTraceSource {
    slot: Arc<SinkSlot<TraceEvent>>,
    snapshot_requests: Arc<AtomicU64>,
    clock: Arc<dyn Clock>,
}

impl FeedTraceSource {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: SinkSlot::new(),
            snapshot_requests: Arc::new(AtomicU64::new(0)),
            clock,
        }
    }

    pub fn feed(&self) -> TraceFeed {
        TraceFeed {
            slot: Arc::clone(&self.slot),
            snapshot_requests: Arc::clone(&self.snapshot_requests),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl TraceSource for FeedTraceSource {
    fn start(
        &mut self,
        sink: EventSink<TraceEvent>,
        options: &TraceOptions,
    ) -> Result<(), CaptureError> {
        if !self.slot.install(sink) {
            return Err(CaptureError::RecorderAlreadyActive("trace"));
        }
        debug!("trace feed open (block selector: {})", options.block_selector);
        Ok(())
    }

    fn stop(&mut self) {
        self.slot.clear();
    }

    fn take_full_snapshot(&mut self) -> Result<(), CaptureError> {
        self.snapshot_requests.fetch_add(1, Ordering::SeqCst);
        info!("full trace snapshot requested");
        Ok(())
    }
}

/// Host-side handle of a [`FeedTraceSource`].
#[derive(Clone)]
pub struct TraceFeed {
    slot: Arc<SinkSlot<TraceEvent>>,
    snapshot_requests: Arc<AtomicU64>,
    clock: Arc<dyn Clock>,
}

impl TraceFeed {
    /// Returns whether the event was taken.
    pub fn emit(&self, event: TraceEvent) -> bool {
        self.slot.emit(event)
    }

    /// Emits a raw recorder payload, stamped with its own `timestamp` field
    /// or the current time if it has none.
    pub fn emit_json(&self, payload: Value) -> bool {
        let timestamp = payload
            .get("timestamp")
            .and_then(Value::as_i64)
            .unwrap_or_else(|| self.clock.now_ms());
        self.emit(TraceEvent::new(timestamp, payload))
    }

    /// Number of full snapshots requested since the last call.
    pub fn take_snapshot_requests(&self) -> u64 {
        self.snapshot_requests.swap(0, Ordering::SeqCst)
    }
}
