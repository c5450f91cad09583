use std::sync::Arc;

use log::debug;

use super::clock::Clock;
use super::recorder::{EventSink, Recorder, SinkSlot};
use super::types::{KeyboardEntry, KeyboardEventType, Modifiers};
use crate::configuration::types::DEFAULT_KEYBOARD_MASK;
use crate::error_handling::types::CaptureError;

/// Element that had focus when the key event fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTarget {
    pub tag_name: String,
    /// The `type` attribute for input elements.
    pub input_type: Option<String>,
}

impl EventTarget {
    pub fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_string(),
            input_type: None,
        }
    }

    pub fn input(input_type: &str) -> Self {
        Self {
            tag_name: "INPUT".to_string(),
            input_type: Some(input_type.to_string()),
        }
    }

    fn is_password_field(&self) -> bool {
        self.tag_name.eq_ignore_ascii_case("input")
            && self
                .input_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case("password"))
    }
}

/// A key event as dispatched by the host during the capture phase.
#[derive(Debug, Clone, PartialEq)]
pub struct HostKeyEvent {
    pub kind: KeyboardEventType,
    pub key: String,
    pub code: String,
    pub modifiers: Modifiers,
    pub repeat: bool,
    pub target: Option<EventTarget>,
}

pub struct KeyboardRecorder {
    slot: Arc<SinkSlot<KeyboardEntry>>,
    clock: Arc<dyn Clock>,
    mask: char,
}

impl KeyboardRecorder {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_mask(clock, DEFAULT_KEYBOARD_MASK)
    }

    pub fn with_mask(clock: Arc<dyn Clock>, mask: char) -> Self {
        Self {
            slot: SinkSlot::new(),
            clock,
            mask,
        }
    }

    /// Listener the host attaches to key-down and key-up.
    pub fn listener(&self) -> KeyListener {
        KeyListener {
            slot: Arc::clone(&self.slot),
            clock: Arc::clone(&self.clock),
            mask: self.mask,
        }
    }
}

impl Recorder for KeyboardRecorder {
    type Record = KeyboardEntry;

    fn start(&mut self, sink: EventSink<KeyboardEntry>) -> Result<(), CaptureError> {
        if !self.slot.install(sink) {
            debug!("keyboard recorder already active");
        }
        Ok(())
    }

    fn stop(&mut self) {
        if self.slot.clear() {
            debug!("keyboard recorder stopped");
        }
    }

    fn is_active(&self) -> bool {
        self.slot.is_active()
    }
}

#[derive(Clone)]
pub struct KeyListener {
    slot: Arc<SinkSlot<KeyboardEntry>>,
    clock: Arc<dyn Clock>,
    mask: char,
}

impl KeyListener {
    pub fn handle(&self, event: &HostKeyEvent) {
        if !self.slot.is_active() {
            return;
        }

        let masked = event
            .target
            .as_ref()
            .is_some_and(EventTarget::is_password_field);
        let key = if masked {
            self.mask.to_string()
        } else {
            event.key.clone()
        };

        self.slot.emit(KeyboardEntry {
            timestamp: self.clock.now_ms(),
            event_type: event.kind,
            key,
            code: event.code.clone(),
            modifiers: event.modifiers,
            repeat: event.repeat,
            target_type: event.target.as_ref().map(|t| t.tag_name.clone()),
            masked: masked.then_some(true),
        });
    }
}
