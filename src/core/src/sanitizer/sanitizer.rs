//! Sanitizer
//!
//! Redacts values stored under sensitive key names. A key is sensitive when it
//! matches one of the [`KeyMatcher`] patterns; its value is replaced by the mask
//! token if, and only if, it is a string. Numbers, booleans and nested
//! structures under a sensitive key are left as they are.
//!
//! The sanitizer holds no per-record state and never mutates its input in
//! place; every function returns a new value.

use std::collections::BTreeMap;

use log::trace;
use serde_json::{Map, Value};
use url::{form_urlencoded, Url};

use super::patterns::KeyMatcher;
use crate::configuration::types::{CaptureConfig, DEFAULT_MASK_TOKEN};
use crate::data_capture::types::{ConsoleEntry, NetworkEntry, SerializedValue};
use crate::error_handling::types::ConfigError;

#[derive(Debug, Clone)]
pub struct Sanitizer {
    keys: KeyMatcher,
    mask: String,
}

impl Sanitizer {
    pub fn new(extra_patterns: &[String], mask: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            keys: KeyMatcher::new(extra_patterns)?,
            mask: mask.to_string(),
        })
    }

    /// Built-in patterns and the default mask token.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::new(&[], DEFAULT_MASK_TOKEN)
    }

    pub fn from_config(config: &CaptureConfig) -> Result<Self, ConfigError> {
        Self::new(&config.sensitive_patterns, &config.mask_token)
    }

    pub fn is_sensitive_key(&self, key: &str) -> bool {
        self.keys.is_sensitive(key)
    }

    pub fn mask(&self) -> &str {
        &self.mask
    }

    /// Masks a value found under a sensitive key.
    fn mask_value(&self, value: &Value) -> Value {
        match value {
            Value::String(_) => Value::String(self.mask.clone()),
            other => other.clone(),
        }
    }

    /// Redacts sensitive keys at every level of a mapping.
    ///
    /// Not cycle-safe; JSON values cannot be cyclic.
    pub fn sanitize_object(&self, map: &Map<String, Value>) -> Map<String, Value> {
        map.iter()
            .map(|(key, value)| {
                let value = if self.is_sensitive_key(key) {
                    self.mask_value(value)
                } else {
                    self.sanitize_json(value)
                };
                (key.clone(), value)
            })
            .collect()
    }

    fn sanitize_json(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.sanitize_object(map)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.sanitize_json(v)).collect()),
            other => other.clone(),
        }
    }

    /// One-level redaction of a header map.
    pub fn sanitize_headers(
        &self,
        headers: Option<&BTreeMap<String, String>>,
    ) -> Option<BTreeMap<String, String>> {
        headers.map(|headers| {
            headers
                .iter()
                .map(|(name, value)| {
                    let value = if self.is_sensitive_key(name) {
                        self.mask.clone()
                    } else {
                        value.clone()
                    };
                    (name.clone(), value)
                })
                .collect()
        })
    }

    /// Redacts a request or response body.
    ///
    /// JSON objects and arrays are sanitized and re-serialized. Any other JSON
    /// document is returned as is. Non-JSON text containing `=` is treated as
    /// form-encoded. Everything else passes through. An empty body yields `None`.
    pub fn sanitize_body(&self, body: Option<&str>) -> Option<String> {
        let body = body.filter(|b| !b.is_empty())?;

        match serde_json::from_str::<Value>(body) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => {
                match serde_json::to_string(&self.sanitize_json(&parsed)) {
                    Ok(text) => Some(text),
                    Err(e) => {
                        trace!("could not re-serialize sanitized body: {}", e);
                        Some(body.to_string())
                    }
                }
            }
            Ok(_) => Some(body.to_string()),
            Err(_) if body.contains('=') => Some(self.sanitize_form(body)),
            Err(_) => Some(body.to_string()),
        }
    }

    fn sanitize_form(&self, body: &str) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        for (key, value) in form_urlencoded::parse(body.as_bytes()) {
            if self.is_sensitive_key(&key) {
                out.append_pair(&key, &self.mask);
            } else {
                out.append_pair(&key, &value);
            }
        }
        out.finish()
    }

    /// Masks sensitive query parameters of an absolute URL.
    ///
    /// A URL that does not parse, or has no sensitive parameter, is returned unchanged.
    pub fn sanitize_url(&self, url: &str) -> String {
        let Ok(mut parsed) = Url::parse(url) else {
            return url.to_string();
        };
        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if !pairs.iter().any(|(k, _)| self.is_sensitive_key(k)) {
            return url.to_string();
        }

        parsed.query_pairs_mut().clear().extend_pairs(pairs.iter().map(|(k, v)| {
            if self.is_sensitive_key(k) {
                (k.as_str(), self.mask.as_str())
            } else {
                (k.as_str(), v.as_str())
            }
        }));
        parsed.to_string()
    }

    pub fn sanitize_network_entry(&self, entry: NetworkEntry) -> NetworkEntry {
        NetworkEntry {
            url: self.sanitize_url(&entry.url),
            request_headers: self.sanitize_headers(entry.request_headers.as_ref()),
            response_headers: self.sanitize_headers(entry.response_headers.as_ref()),
            request_body: self.sanitize_body(entry.request_body.as_deref()),
            response_body: self.sanitize_body(entry.response_body.as_deref()),
            ..entry
        }
    }

    /// Redacts object and array arguments. Scalars and tagged values are kept.
    pub fn sanitize_console_entry(&self, entry: ConsoleEntry) -> ConsoleEntry {
        ConsoleEntry {
            args: entry
                .args
                .into_iter()
                .map(|arg| self.sanitize_serialized(arg))
                .collect(),
            ..entry
        }
    }

    fn sanitize_serialized(&self, value: SerializedValue) -> SerializedValue {
        match value {
            SerializedValue::Mapping(map) => SerializedValue::Mapping(
                map.into_iter()
                    .map(|(key, value)| {
                        let value = match value {
                            SerializedValue::String(_) if self.is_sensitive_key(&key) => {
                                SerializedValue::String(self.mask.clone())
                            }
                            other if self.is_sensitive_key(&key) => other,
                            other => self.sanitize_serialized(other),
                        };
                        (key, value)
                    })
                    .collect(),
            ),
            SerializedValue::Sequence(items) => SerializedValue::Sequence(
                items
                    .into_iter()
                    .map(|v| self.sanitize_serialized(v))
                    .collect(),
            ),
            other => other,
        }
    }
}
