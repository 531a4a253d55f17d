//! Flat telemetry records.
//!
//! Telemetry arrives as attribute maps rather than fixed structs: each
//! record describes one observed leg of a call, and the consumer decides at
//! setup time which attributes carry the trace identifiers, the endpoints
//! and the measurements. A [`StreamSchema`] declares the attribute types so
//! that setup can be validated before the first record arrives.

use core::fmt;
use std::collections::BTreeMap;

/// Well-known attribute names emitted by the telemetry agents.
pub mod attributes {
    pub const RUNTIME: &str = "runtime";
    pub const REQUEST_ID: &str = "requestId";
    pub const TRACE_ID: &str = "traceId";
    pub const SPAN_ID: &str = "spanId";
    pub const PARENT_SPAN_ID: &str = "parentSpanId";
    pub const SOURCE_NAMESPACE: &str = "sourceNamespace";
    pub const SOURCE_INSTANCE: &str = "sourceInstance";
    pub const SOURCE_INSTANCE_KIND: &str = "sourceInstanceKind";
    pub const SOURCE_COMPONENT: &str = "sourceComponent";
    pub const DESTINATION_NAMESPACE: &str = "destinationNamespace";
    pub const DESTINATION_INSTANCE: &str = "destinationInstance";
    pub const DESTINATION_INSTANCE_KIND: &str = "destinationInstanceKind";
    pub const DESTINATION_COMPONENT: &str = "destinationComponent";
    pub const REQUEST_SIZE_BYTES: &str = "requestSizeBytes";
    pub const RESPONSE_DURATION: &str = "responseDuration";
    pub const RESPONSE_SIZE_BYTES: &str = "responseSizeBytes";
}

/// The declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AttributeType {
    String,
    Int,
    Long,
    Double,
    Bool,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeType::String => "STRING",
            AttributeType::Int => "INT",
            AttributeType::Long => "LONG",
            AttributeType::Double => "DOUBLE",
            AttributeType::Bool => "BOOL",
        };
        f.write_str(name)
    }
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Long(i64),
    Int(i32),
    Double(f64),
    String(String),
}

impl AttributeValue {
    /// The type of this value, or `None` for null.
    pub fn attribute_type(&self) -> Option<AttributeType> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Bool(_) => Some(AttributeType::Bool),
            AttributeValue::Long(_) => Some(AttributeType::Long),
            AttributeValue::Int(_) => Some(AttributeType::Int),
            AttributeValue::Double(_) => Some(AttributeType::Double),
            AttributeValue::String(_) => Some(AttributeType::String),
        }
    }

    /// The value as a string slice, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The value widened to a long, if it is an integer.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            AttributeValue::Long(v) => Some(*v),
            AttributeValue::Int(v) => Some(i64::from(*v)),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Long(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Double(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(AttributeValue::Null, Into::into)
    }
}

/// One telemetry record: a flat map of attribute name to value.
///
/// # Example
///
/// ```rust
/// use meshgraph_types::TelemetryEvent;
///
/// let event = TelemetryEvent::new()
///     .with("traceId", "t-1")
///     .with("spanId", "s-1")
///     .with("requestSizeBytes", 128i64);
///
/// assert_eq!(event.get_str("traceId"), Some("t-1"));
/// assert_eq!(event.get_long("requestSizeBytes"), Some(128));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TelemetryEvent {
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl TelemetryEvent {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute, consuming the record.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set an attribute in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Get a raw attribute value.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Get a string attribute. Nulls and non-strings read as `None`.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttributeValue::as_str)
    }

    /// Get an integer attribute widened to a long.
    pub fn get_long(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(AttributeValue::as_long)
    }
}

/// Declared attribute types of a telemetry stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct StreamSchema {
    pub attributes: BTreeMap<String, AttributeType>,
}

impl StreamSchema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an attribute, consuming the schema.
    pub fn attribute(mut self, name: impl Into<String>, ty: AttributeType) -> Self {
        self.attributes.insert(name.into(), ty);
        self
    }

    /// Look up the declared type of an attribute.
    pub fn type_of(&self, name: &str) -> Option<AttributeType> {
        self.attributes.get(name).copied()
    }

    /// The schema of the telemetry stream produced by the mesh agents.
    pub fn telemetry() -> Self {
        use attributes::*;

        let mut schema = Self::new();
        for name in [
            RUNTIME,
            REQUEST_ID,
            TRACE_ID,
            SPAN_ID,
            PARENT_SPAN_ID,
            SOURCE_NAMESPACE,
            SOURCE_INSTANCE,
            SOURCE_INSTANCE_KIND,
            SOURCE_COMPONENT,
            DESTINATION_NAMESPACE,
            DESTINATION_INSTANCE,
            DESTINATION_INSTANCE_KIND,
            DESTINATION_COMPONENT,
        ] {
            schema = schema.attribute(name, AttributeType::String);
        }
        for name in [REQUEST_SIZE_BYTES, RESPONSE_DURATION, RESPONSE_SIZE_BYTES] {
            schema = schema.attribute(name, AttributeType::Long);
        }
        schema
    }
}
