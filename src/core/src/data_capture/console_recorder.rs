//! Console interception.
//!
//! [`ConsoleRecorder::wrap`] takes the host's real console and returns an
//! [`InterceptedConsole`] that the host installs in its place. Every call is
//! forwarded to the real console first; only then, and only while the
//! recorder is active, is a [`ConsoleEntry`] built and emitted.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::SecondsFormat;
use log::debug;

use super::clock::Clock;
use super::host::{DomNode, HostValue};
use super::recorder::{EventSink, Recorder, SinkSlot};
use super::types::{ConsoleEntry, ConsoleLevel, SerializedValue, TaggedValue};
use crate::error_handling::types::CaptureError;

/// The host's real console.
pub trait HostConsole: Send + Sync {
    fn write(&self, level: ConsoleLevel, args: &[HostValue]);

    /// The host call stack at the moment of the call, innermost frame first.
    fn current_stack(&self) -> Option<String> {
        None
    }
}

pub struct ConsoleRecorder {
    slot: Arc<SinkSlot<ConsoleEntry>>,
    clock: Arc<dyn Clock>,
}

impl ConsoleRecorder {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: SinkSlot::new(),
            clock,
        }
    }

    /// Wraps `original`. The wrapper records only while this recorder is active.
    pub fn wrap(&self, original: Arc<dyn HostConsole>) -> InterceptedConsole {
        InterceptedConsole {
            original,
            slot: Arc::clone(&self.slot),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl Recorder for ConsoleRecorder {
    type Record = ConsoleEntry;

    fn start(&mut self, sink: EventSink<ConsoleEntry>) -> Result<(), CaptureError> {
        if !self.slot.install(sink) {
            debug!("console recorder already active");
        }
        Ok(())
    }

    fn stop(&mut self) {
        if self.slot.clear() {
            debug!("console recorder stopped");
        }
    }

    fn is_active(&self) -> bool {
        self.slot.is_active()
    }
}

/// Drop-in replacement for the host console.
pub struct InterceptedConsole {
    original: Arc<dyn HostConsole>,
    slot: Arc<SinkSlot<ConsoleEntry>>,
    clock: Arc<dyn Clock>,
}

impl InterceptedConsole {
    pub fn call(&self, level: ConsoleLevel, args: &[HostValue]) {
        self.original.write(level, args);

        if !self.slot.is_active() {
            return;
        }
        let entry = self.build_entry(level, args);
        self.slot.emit(entry);
    }

    pub fn log(&self, args: &[HostValue]) {
        self.call(ConsoleLevel::Log, args)
    }

    pub fn info(&self, args: &[HostValue]) {
        self.call(ConsoleLevel::Info, args)
    }

    pub fn warn(&self, args: &[HostValue]) {
        self.call(ConsoleLevel::Warn, args)
    }

    pub fn error(&self, args: &[HostValue]) {
        self.call(ConsoleLevel::Error, args)
    }

    pub fn debug(&self, args: &[HostValue]) {
        self.call(ConsoleLevel::Debug, args)
    }

    /// Gives the original console back.
    pub fn into_inner(self) -> Arc<dyn HostConsole> {
        self.original
    }

    fn build_entry(&self, level: ConsoleLevel, args: &[HostValue]) -> ConsoleEntry {
        let stack = if level == ConsoleLevel::Error {
            self.error_stack(args)
        } else {
            None
        };
        ConsoleEntry {
            timestamp: self.clock.now_ms(),
            level,
            args: args.iter().map(serialize_value).collect(),
            stack,
        }
    }

    /// The first Error argument's own stack, else the host stack minus the
    /// two innermost frames (the interception frames).
    fn error_stack(&self, args: &[HostValue]) -> Option<String> {
        let first_error = args.iter().find_map(|arg| match arg {
            HostValue::Error(e) => Some(e),
            _ => None,
        });
        if let Some(stack) = first_error.and_then(|e| e.stack.clone()) {
            if !stack.is_empty() {
                return Some(stack);
            }
        }
        self.original
            .current_stack()
            .map(|stack| stack.lines().skip(2).collect::<Vec<_>>().join("\n"))
    }
}

impl HostConsole for InterceptedConsole {
    fn write(&self, level: ConsoleLevel, args: &[HostValue]) {
        self.call(level, args)
    }

    fn current_stack(&self) -> Option<String> {
        self.original.current_stack()
    }
}

/// Converts a host value into plain data.
///
/// Arrays and objects already visited during this conversion become
/// `"[Circular]"`. An object whose property read fails becomes its string form.
pub fn serialize_value(value: &HostValue) -> SerializedValue {
    let mut seen = HashSet::new();
    serialize_inner(value, &mut seen)
}

fn serialize_inner(value: &HostValue, seen: &mut HashSet<usize>) -> SerializedValue {
    match value {
        HostValue::Undefined | HostValue::Null => SerializedValue::Null,
        HostValue::Bool(b) => SerializedValue::Bool(*b),
        HostValue::Number(n) if n.is_finite() => SerializedValue::Number(*n),
        HostValue::Number(_) => SerializedValue::Null,
        HostValue::String(s) => SerializedValue::String(s.clone()),
        HostValue::BigInt(digits) => SerializedValue::String(format!("BigInt({})", digits)),
        HostValue::Symbol(description) => SerializedValue::String(format!(
            "Symbol({})",
            description.as_deref().unwrap_or("")
        )),
        HostValue::Function(name) => SerializedValue::String(format!(
            "[Function: {}]",
            name.as_deref().filter(|n| !n.is_empty()).unwrap_or("anonymous")
        )),
        HostValue::Error(e) => SerializedValue::Tagged(TaggedValue::Error {
            name: e.name.clone(),
            message: e.message.clone(),
            stack: e.stack.clone(),
        }),
        HostValue::Date(date) => SerializedValue::Tagged(TaggedValue::Date {
            value: date.to_rfc3339_opts(SecondsFormat::Millis, true),
        }),
        HostValue::RegExp { source, flags } => SerializedValue::Tagged(TaggedValue::RegExp {
            value: format!("/{}/{}", source, flags),
        }),
        HostValue::Node(node) => SerializedValue::String(describe_node(node)),
        HostValue::Array(array) => {
            if !seen.insert(array.identity()) {
                return SerializedValue::String("[Circular]".to_string());
            }
            SerializedValue::Sequence(
                array
                    .items()
                    .iter()
                    .map(|item| serialize_inner(item, seen))
                    .collect(),
            )
        }
        HostValue::Object(object) => {
            if !seen.insert(object.identity()) {
                return SerializedValue::String("[Circular]".to_string());
            }
            let mut mapping = std::collections::BTreeMap::new();
            for key in object.keys() {
                match object.get(&key) {
                    Ok(v) => {
                        mapping.insert(key, serialize_inner(&v, seen));
                    }
                    Err(e) => {
                        debug!("property '{}' unreadable ({}), using string form", key, e);
                        return SerializedValue::String(object.label().to_string());
                    }
                }
            }
            SerializedValue::Mapping(mapping)
        }
    }
}

fn describe_node(node: &DomNode) -> String {
    match node {
        DomNode::Element {
            tag_name,
            id,
            class_name,
        } => {
            let mut out = format!("[Element: <{}", tag_name.to_lowercase());
            if let Some(id) = id.as_deref().filter(|s| !s.is_empty()) {
                out.push_str(&format!(" id=\"{}\"", id));
            }
            if let Some(class) = class_name.as_deref().filter(|s| !s.is_empty()) {
                out.push_str(&format!(" class=\"{}\"", class));
            }
            out.push_str(">]");
            out
        }
        DomNode::Other { node_name } => format!("[Node: {}]", node_name),
    }
}
