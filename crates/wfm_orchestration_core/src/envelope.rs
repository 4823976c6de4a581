use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::error::EnvelopeError;

/// A domain event as carried by the shared bus.
///
/// Field names follow the bus wire format, including the hyphenated
/// `detail-type`. Envelopes are read-only once parsed; the optional
/// bookkeeping fields never take part in matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    resources: Vec<String>,
    source: String,
    #[serde(rename = "detail-type")]
    detail_type: String,
    detail: Map<String, Value>,
}

impl EventEnvelope {
    pub fn new(
        source: impl Into<String>,
        detail_type: impl Into<String>,
        detail: Map<String, Value>,
    ) -> Self {
        Self {
            id: None,
            version: None,
            account: None,
            region: None,
            time: None,
            resources: Vec::new(),
            source: source.into(),
            detail_type: detail_type.into(),
            detail,
        }
    }

    /// Parses a raw bus event. Producers occasionally deliver the event as a
    /// JSON-encoded string, so a string payload is decoded first.
    pub fn from_value(event: Value) -> Result<Self, EnvelopeError> {
        let event = match event {
            Value::String(text) => {
                serde_json::from_str(&text).map_err(EnvelopeError::MalformedJson)?
            }
            other => other,
        };

        if !event.is_object() {
            return Err(EnvelopeError::NotAnObject);
        }

        serde_json::from_value(event).map_err(EnvelopeError::InvalidShape)
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn time(&self) -> Option<&str> {
        self.time.as_deref()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn detail_type(&self) -> &str {
        &self.detail_type
    }

    pub fn detail(&self) -> &Map<String, Value> {
        &self.detail
    }

    /// True when `field` is present in the detail and not JSON null.
    pub fn has_detail_field(&self, field: &str) -> bool {
        self.detail.get(field).is_some_and(|value| !value.is_null())
    }

    /// SHA-256 over the routed content (source, type and detail).
    ///
    /// Object keys serialize in sorted order, so the fingerprint does not
    /// depend on the key order the producer used. Bus bookkeeping fields are
    /// left out, which keeps redeliveries of the same content correlated.
    pub fn fingerprint(&self) -> String {
        let canonical = json!({
            "source": self.source,
            "detail-type": self.detail_type,
            "detail": self.detail,
        });
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string());
        format!("{:x}", hasher.finalize())
    }
}
