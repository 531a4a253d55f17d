//! Deduplication window configuration.

use meshgraph_types::{attributes, AttributeType, AttributeValue, StreamSchema};
use thiserror::Error;

/// Errors raised while validating a [`DedupConfig`] against a stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The window length is not an integer constant.
    #[error("Window length should be either INT or LONG, but found {found}")]
    WindowType { found: String },

    /// The window length is negative.
    #[error("Window length must not be negative, but found {0}")]
    NegativeWindow(i64),

    /// A field is not named, or the stream has no attribute with that name.
    #[error("Expected a field with {expected} type for the {role} field, but '{attribute}' is not defined")]
    MissingField {
        role: &'static str,
        attribute: String,
        expected: AttributeType,
    },

    /// A field exists but has the wrong type.
    #[error("Expected a field with {expected} type for the {role} field, but found a field with type {found}")]
    FieldType {
        role: &'static str,
        attribute: String,
        expected: AttributeType,
        found: AttributeType,
    },
}

/// Names of the stream attributes the window reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupFields {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: String,
    pub source_namespace: String,
    pub source_instance: String,
    pub source_component: String,
    pub destination_namespace: String,
    pub destination_instance: String,
    pub destination_component: String,
    pub request_size: String,
    pub response_duration: String,
    pub response_size: String,
}

impl DedupFields {
    /// The standard telemetry attribute names.
    pub fn telemetry() -> Self {
        Self {
            trace_id: attributes::TRACE_ID.to_string(),
            span_id: attributes::SPAN_ID.to_string(),
            parent_span_id: attributes::PARENT_SPAN_ID.to_string(),
            source_namespace: attributes::SOURCE_NAMESPACE.to_string(),
            source_instance: attributes::SOURCE_INSTANCE.to_string(),
            source_component: attributes::SOURCE_COMPONENT.to_string(),
            destination_namespace: attributes::DESTINATION_NAMESPACE.to_string(),
            destination_instance: attributes::DESTINATION_INSTANCE.to_string(),
            destination_component: attributes::DESTINATION_COMPONENT.to_string(),
            request_size: attributes::REQUEST_SIZE_BYTES.to_string(),
            response_duration: attributes::RESPONSE_DURATION.to_string(),
            response_size: attributes::RESPONSE_SIZE_BYTES.to_string(),
        }
    }

    fn expectations(&self) -> [(&'static str, &str, AttributeType); 12] {
        use AttributeType as T;
        [
            ("traceId", self.trace_id.as_str(), T::String),
            ("spanId", self.span_id.as_str(), T::String),
            ("parentSpanId", self.parent_span_id.as_str(), T::String),
            ("sourceNamespace", self.source_namespace.as_str(), T::String),
            ("sourceInstance", self.source_instance.as_str(), T::String),
            ("sourceComponent", self.source_component.as_str(), T::String),
            ("destinationNamespace", self.destination_namespace.as_str(), T::String),
            ("destinationInstance", self.destination_instance.as_str(), T::String),
            ("destinationComponent", self.destination_component.as_str(), T::String),
            ("requestSizeBytes", self.request_size.as_str(), T::Long),
            ("responseDuration", self.response_duration.as_str(), T::Long),
            ("responseSizeBytes", self.response_size.as_str(), T::Long),
        ]
    }
}

impl Default for DedupFields {
    fn default() -> Self {
        Self::telemetry()
    }
}

/// Settings for a [`DeduplicationWindow`](super::DeduplicationWindow).
///
/// The window length is given as an attribute value so that configuration
/// coming from a pipeline definition can be checked the same way as a
/// stream field: it must be an `INT` or `LONG` constant, in milliseconds.
///
/// # Example
///
/// ```rust
/// use meshgraph_engine::dedup::DedupConfig;
/// use meshgraph_types::{AttributeValue, StreamSchema};
///
/// let schema = StreamSchema::telemetry();
/// assert!(DedupConfig::new(5_000).validate(&schema).is_ok());
///
/// let bad = DedupConfig::new(5_000).with_window(AttributeValue::from("5s"));
/// assert!(bad.validate(&schema).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DedupConfig {
    pub window: AttributeValue,
    pub fields: DedupFields,
}

impl DedupConfig {
    /// A window of `window_ms` over the standard telemetry fields.
    pub fn new(window_ms: i64) -> Self {
        Self {
            window: AttributeValue::Long(window_ms),
            fields: DedupFields::telemetry(),
        }
    }

    pub fn with_window(mut self, window: AttributeValue) -> Self {
        self.window = window;
        self
    }

    pub fn with_fields(mut self, fields: DedupFields) -> Self {
        self.fields = fields;
        self
    }

    /// Check the configuration against the stream it will run on.
    ///
    /// Returns the window length in milliseconds.
    pub fn validate(&self, schema: &StreamSchema) -> Result<u64, ConfigError> {
        let window_ms = match &self.window {
            AttributeValue::Int(v) => i64::from(*v),
            AttributeValue::Long(v) => *v,
            other => {
                return Err(ConfigError::WindowType {
                    found: other
                        .attribute_type()
                        .map_or_else(|| "NULL".to_string(), |ty| ty.to_string()),
                })
            }
        };
        if window_ms < 0 {
            return Err(ConfigError::NegativeWindow(window_ms));
        }

        for (role, attribute, expected) in self.fields.expectations() {
            match schema.type_of(attribute) {
                None => {
                    return Err(ConfigError::MissingField {
                        role,
                        attribute: attribute.to_string(),
                        expected,
                    })
                }
                Some(found) if found != expected => {
                    return Err(ConfigError::FieldType {
                        role,
                        attribute: attribute.to_string(),
                        expected,
                        found,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(window_ms as u64)
    }
}
