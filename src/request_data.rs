//! Serialization-ready payload for one delivery attempt
//!
//! Binds the prepared packet to its request snapshot and produces the
//! raw and scrubbed JSON text that goes on the wire.

use serde_json::Value;

use crate::context::RequestContext;
use crate::error::{RavenError, Result};
use crate::packet::JsonPacket;
use crate::scrub::Scrubber;

/// Field the request snapshot is stored under
const REQUEST_FIELD: &str = "request";

#[derive(Debug, Clone)]
pub struct RequestData {
    packet: JsonPacket,
    context: Option<RequestContext>,
    scrubber: Option<Scrubber>,
}

impl RequestData {
    pub fn new(
        packet: JsonPacket,
        context: Option<RequestContext>,
        scrubber: Option<Scrubber>,
    ) -> Self {
        Self {
            packet,
            context,
            scrubber,
        }
    }

    pub fn packet(&self) -> &JsonPacket {
        &self.packet
    }

    pub fn context(&self) -> Option<&RequestContext> {
        self.context.as_ref()
    }

    /// Unscrubbed JSON payload
    pub fn raw(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_value()?)?)
    }

    /// JSON payload with sensitive values masked
    ///
    /// Same as [`raw`](Self::raw) when no scrubber is configured.
    pub fn scrubbed(&self) -> Result<String> {
        let mut value = self.to_value()?;
        if let Some(scrubber) = &self.scrubber {
            scrubber.scrub(&mut value);
        }
        Ok(serde_json::to_string(&value)?)
    }

    fn to_value(&self) -> Result<Value> {
        let mut value = serde_json::to_value(&self.packet)?;

        if let Some(context) = &self.context {
            let fields = value.as_object_mut().ok_or_else(|| {
                RavenError::from_string("event packet did not serialize to a JSON object")
            })?;
            fields.insert(REQUEST_FIELD.to_string(), serde_json::to_value(context)?);
        }

        Ok(value)
    }
}
