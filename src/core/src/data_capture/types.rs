//! Record types produced by the recorders and stored in the stream buffers.
//!
//! Field names serialize in camelCase because the artifact viewer reads them
//! under those names.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Anything that can live in a [`TimeWindowBuffer`](super::TimeWindowBuffer).
pub trait Timestamped {
    /// Milliseconds since the Unix epoch.
    fn timestamp(&self) -> i64;
}

/// Opaque event emitted by the external DOM/interaction recorder.
///
/// The payload is kept verbatim next to its timestamp, so the event serializes
/// exactly as the replayer expects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub timestamp: i64,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl TraceEvent {
    /// Wraps a recorder payload. A non-object payload is kept under `data`.
    pub fn new(timestamp: i64, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(mut map) => {
                map.remove("timestamp");
                map
            }
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        Self { timestamp, payload }
    }
}

impl Timestamped for TraceEvent {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl ConsoleLevel {
    pub const ALL: [ConsoleLevel; 5] = [
        ConsoleLevel::Log,
        ConsoleLevel::Info,
        ConsoleLevel::Warn,
        ConsoleLevel::Error,
        ConsoleLevel::Debug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
            ConsoleLevel::Debug => "debug",
        }
    }
}

/// Discriminator key of [`TaggedValue`].
pub const TYPE_KEY: &str = "__type";

/// Special objects that keep their kind after serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__type")]
pub enum TaggedValue {
    Error {
        name: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },
    Date {
        value: String,
    },
    RegExp {
        value: String,
    },
}

/// A console argument after conversion to plain data.
///
/// Encoded as plain JSON. Only `Tagged` values carry a `__type` key: a
/// mapping key of the form `__type`, `___type`, ... gains one leading
/// underscore when encoded and loses it when decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum SerializedValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Tagged(TaggedValue),
    Sequence(Vec<SerializedValue>),
    Mapping(BTreeMap<String, SerializedValue>),
}

/// Underscores in front of `_type`, if `key` is made of nothing else.
fn type_key_depth(key: &str) -> Option<usize> {
    let prefix = key.strip_suffix("_type")?;
    (!prefix.is_empty() && prefix.bytes().all(|b| b == b'_')).then_some(prefix.len())
}

fn escape_key(key: &str) -> Cow<'_, str> {
    match type_key_depth(key) {
        Some(_) => Cow::Owned(format!("_{}", key)),
        None => Cow::Borrowed(key),
    }
}

fn unescape_key(key: String) -> String {
    match type_key_depth(&key) {
        Some(depth) if depth >= 2 => key[1..].to_string(),
        _ => key,
    }
}

impl Serialize for SerializedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SerializedValue::Null => serializer.serialize_unit(),
            SerializedValue::Bool(b) => serializer.serialize_bool(*b),
            SerializedValue::Number(n) => serializer.serialize_f64(*n),
            SerializedValue::String(s) => serializer.serialize_str(s),
            SerializedValue::Tagged(tagged) => tagged.serialize(serializer),
            SerializedValue::Sequence(items) => items.serialize(serializer),
            SerializedValue::Mapping(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    let key = escape_key(key);
                    out.serialize_entry(&*key, value)?;
                }
                out.end()
            }
        }
    }
}

impl TryFrom<Value> for SerializedValue {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Ok(match value {
            Value::Null => SerializedValue::Null,
            Value::Bool(b) => SerializedValue::Bool(b),
            Value::Number(n) => SerializedValue::Number(
                n.as_f64()
                    .ok_or_else(|| format!("number {} is not representable", n))?,
            ),
            Value::String(s) => SerializedValue::String(s),
            Value::Array(items) => SerializedValue::Sequence(
                items
                    .into_iter()
                    .map(SerializedValue::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) if map.contains_key(TYPE_KEY) => SerializedValue::Tagged(
                serde_json::from_value(Value::Object(map)).map_err(|e| e.to_string())?,
            ),
            Value::Object(map) => SerializedValue::Mapping(
                map.into_iter()
                    .map(|(key, value)| Ok((unescape_key(key), SerializedValue::try_from(value)?)))
                    .collect::<Result<_, String>>()?,
            ),
        })
    }
}

impl<'de> Deserialize<'de> for SerializedValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        SerializedValue::try_from(value).map_err(de::Error::custom)
    }
}

impl From<&str> for SerializedValue {
    fn from(value: &str) -> Self {
        SerializedValue::String(value.to_string())
    }
}

impl From<String> for SerializedValue {
    fn from(value: String) -> Self {
        SerializedValue::String(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    pub timestamp: i64,
    pub level: ConsoleLevel,
    #[serde(default)]
    pub args: Vec<SerializedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl Timestamped for ConsoleEntry {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// One logical outbound call.
///
/// At most one of `status` and `error` is set, and `duration` is set together
/// with whichever one it is.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEntry {
    pub timestamp: i64,
    pub id: String,
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Timestamped for NetworkEntry {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyboardEventType {
    Keydown,
    Keyup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(rename = "ctrlKey")]
    pub ctrl: bool,
    #[serde(rename = "shiftKey")]
    pub shift: bool,
    #[serde(rename = "altKey")]
    pub alt: bool,
    #[serde(rename = "metaKey")]
    pub meta: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyboardEntry {
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub event_type: KeyboardEventType,
    pub key: String,
    pub code: String,
    #[serde(flatten)]
    pub modifiers: Modifiers,
    pub repeat: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masked: Option<bool>,
}

impl Timestamped for KeyboardEntry {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}
