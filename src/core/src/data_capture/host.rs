//! Host-side data model: the values a host hands to an intercepted console
//! call, and the page metadata a host exposes for reports.
//!
//! Arrays and objects are shared handles, so a host value graph may contain
//! cycles exactly like the objects of a scripting runtime can.

use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A value as seen by the host at a console call site.
#[derive(Debug, Clone)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    BigInt(String),
    Symbol(Option<String>),
    Function(Option<String>),
    Error(HostError),
    Date(DateTime<Utc>),
    RegExp { source: String, flags: String },
    Node(DomNode),
    Array(HostArray),
    Object(HostObject),
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_string())
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Number(value)
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostError {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
}

impl HostError {
    pub fn new(message: &str) -> Self {
        Self {
            name: "Error".to_string(),
            message: message.to_string(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: &str) -> Self {
        self.stack = Some(stack.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element {
        tag_name: String,
        id: Option<String>,
        class_name: Option<String>,
    },
    Other {
        node_name: String,
    },
}

/// Shared, mutable sequence.
#[derive(Debug, Clone, Default)]
pub struct HostArray(Arc<RwLock<Vec<HostValue>>>);

impl HostArray {
    pub fn new(items: Vec<HostValue>) -> Self {
        Self(Arc::new(RwLock::new(items)))
    }

    pub fn push(&self, item: HostValue) {
        if let Ok(mut items) = self.0.write() {
            items.push(item);
        }
    }

    pub fn items(&self) -> Vec<HostValue> {
        self.0.read().map(|items| items.clone()).unwrap_or_default()
    }

    /// Address-based identity, stable for the lifetime of the array.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

pub type Getter = Arc<dyn Fn() -> Result<HostValue, String> + Send + Sync>;

/// An object property: a stored value, or an accessor whose read may fail.
#[derive(Clone)]
pub enum Property {
    Data(HostValue),
    Accessor(Getter),
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Property::Accessor(_) => f.write_str("Accessor(..)"),
        }
    }
}

#[derive(Debug)]
struct ObjectInner {
    label: String,
    properties: RwLock<Vec<(String, Property)>>,
}

/// Shared, mutable keyed object. Keys keep their insertion order.
#[derive(Debug, Clone)]
pub struct HostObject(Arc<ObjectInner>);

impl Default for HostObject {
    fn default() -> Self {
        Self::new()
    }
}

impl HostObject {
    pub fn new() -> Self {
        Self::with_label("[object Object]")
    }

    /// `label` is what the host prints when it stringifies the object.
    pub fn with_label(label: &str) -> Self {
        Self(Arc::new(ObjectInner {
            label: label.to_string(),
            properties: RwLock::new(Vec::new()),
        }))
    }

    pub fn set(&self, key: &str, value: HostValue) {
        self.define(key, Property::Data(value));
    }

    pub fn define_accessor(&self, key: &str, getter: Getter) {
        self.define(key, Property::Accessor(getter));
    }

    fn define(&self, key: &str, property: Property) {
        if let Ok(mut props) = self.0.properties.write() {
            match props.iter_mut().find(|(k, _)| k == key) {
                Some((_, slot)) => *slot = property,
                None => props.push((key.to_string(), property)),
            }
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.0
            .properties
            .read()
            .map(|props| props.iter().map(|(k, _)| k.clone()).collect())
            .unwrap_or_default()
    }

    /// Reads a property, running its accessor if it has one.
    pub fn get(&self, key: &str) -> Result<HostValue, String> {
        let property = self
            .0
            .properties
            .read()
            .map_err(|_| "property table poisoned".to_string())?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, p)| p.clone());
        match property {
            Some(Property::Data(value)) => Ok(value),
            Some(Property::Accessor(getter)) => getter(),
            None => Ok(HostValue::Undefined),
        }
    }

    pub fn label(&self) -> &str {
        &self.0.label
    }

    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

/// Page metadata copied into every report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageInfo {
    pub url: String,
    pub title: String,
    pub user_agent: String,
    pub screen_width: u32,
    pub screen_height: u32,
}

/// Read access to the host page.
pub trait HostEnvironment: Send + Sync {
    fn page_info(&self) -> PageInfo;
}

/// Environment whose answers never change.
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    pub info: PageInfo,
}

impl StaticEnvironment {
    pub fn new(info: PageInfo) -> Self {
        Self { info }
    }
}

impl HostEnvironment for StaticEnvironment {
    fn page_info(&self) -> PageInfo {
        self.info.clone()
    }
}
