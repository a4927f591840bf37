//! Event packet sent to the Sentry store endpoint
//!
//! The packet is built by the caller and owned by the delivery attempt once
//! handed over. Request context is not part of the struct; it is attached as
//! the `request` field when the payload is serialized.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::utils::{current_timestamp, generate_event_id};

/// Severity of an event
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Fatal,
    #[default]
    Error,
    Warning,
    Info,
    Debug,
}

/// Complete error event
///
/// Unset optional fields are left out of the JSON payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JsonPacket {
    /// 32-char hex id, assigned on construction
    pub event_id: String,

    /// UTC time the event was created
    pub timestamp: String,

    pub level: Level,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,

    pub platform: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Function or route the event originated from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub culprit: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl JsonPacket {
    /// Create an empty packet with a fresh event id and timestamp
    pub fn new() -> Self {
        Self {
            event_id: generate_event_id(),
            timestamp: current_timestamp(),
            level: Level::default(),
            message: None,
            logger: None,
            platform: "rust".to_string(),
            project: None,
            culprit: None,
            server_name: None,
            release: None,
            environment: None,
            tags: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_message(message: impl Into<String>, level: Level) -> Self {
        Self {
            message: Some(message.into()),
            level,
            ..Self::new()
        }
    }

    /// Build a packet from an error, using its `Display` output as the message
    pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        let mut packet = Self::with_message(error.to_string(), Level::Error);
        if let Some(source) = error.source() {
            packet
                .extra
                .insert("source".to_string(), serde_json::Value::String(source.to_string()));
        }
        packet
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn culprit(mut self, culprit: impl Into<String>) -> Self {
        self.culprit = Some(culprit.into());
        self
    }
}

impl Default for JsonPacket {
    fn default() -> Self {
        Self::new()
    }
}
