//! The contract every stream recorder implements, plus the shared slot that
//! connects a recorder to the wrappers it hands out.
//!
//! A recorder is started with an [`EventSink`] and stopped later. While it is
//! active, the wrappers it produced (console, network, keyboard, trace feed)
//! push their records into that sink. Stopping empties the slot, so a wrapper
//! that is still installed by the host becomes a plain pass-through.

use std::sync::{Arc, RwLock};

use crate::error_handling::types::CaptureError;

/// Callback receiving every record a recorder produces.
pub type EventSink<T> = Arc<dyn Fn(T) + Send + Sync>;

pub trait Recorder {
    type Record;

    /// Starts forwarding records to `sink`. Starting an active recorder is a no-op.
    fn start(&mut self, sink: EventSink<Self::Record>) -> Result<(), CaptureError>;

    /// Stops forwarding. Stopping an inactive recorder is a no-op.
    fn stop(&mut self);

    fn is_active(&self) -> bool;
}

/// The currently installed sink, shared between a recorder and its wrappers.
pub(crate) struct SinkSlot<T> {
    sink: RwLock<Option<EventSink<T>>>,
}

impl<T> SinkSlot<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            sink: RwLock::new(None),
        })
    }

    /// Installs `sink` unless one is already present. Returns whether it was installed.
    pub(crate) fn install(&self, sink: EventSink<T>) -> bool {
        match self.sink.write() {
            Ok(mut slot) if slot.is_none() => {
                *slot = Some(sink);
                true
            }
            _ => false,
        }
    }

    /// Removes the sink. Returns whether one was present.
    pub(crate) fn clear(&self) -> bool {
        match self.sink.write() {
            Ok(mut slot) => slot.take().is_some(),
            Err(_) => false,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.sink.read().map(|slot| slot.is_some()).unwrap_or(false)
    }

    pub(crate) fn current(&self) -> Option<EventSink<T>> {
        self.sink.read().ok().and_then(|slot| slot.clone())
    }

    /// Hands `record` to the sink, if any. The lock is released before the
    /// sink runs so a sink may itself touch the slot.
    pub(crate) fn emit(&self, record: T) -> bool {
        match self.current() {
            Some(sink) => {
                sink(record);
                true
            }
            None => false,
        }
    }
}
