//! Redaction of sensitive values in the event payload
//!
//! Scrubbing runs on the JSON tree right before it is turned into bytes.
//! Only values are replaced: keys, nesting and array lengths stay as they were,
//! so a scrubbed payload has exactly the shape of the unscrubbed one.

use serde_json::{Map, Value};
use std::collections::HashSet;

/// Token written in place of sensitive values
pub const DEFAULT_MASK: &str = "***";

/// Keys masked by [`Scrubber::default`], compared case-insensitively
pub const DEFAULT_SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "api_key",
    "apikey",
    "access_token",
    "auth",
    "authorization",
    "proxy-authorization",
    "credentials",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
    "session",
    "sessionid",
    "csrftoken",
];

/// Key whose string value is scrubbed as `k=v&k=v` pairs
const QUERY_STRING_KEY: &str = "query_string";

/// Redaction policy: which keys are sensitive and what replaces their values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scrubber {
    keys: HashSet<String>,
    mask: String,
}

impl Scrubber {
    /// Policy masking exactly `keys`
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keys: keys.into_iter().map(|k| k.as_ref().to_lowercase()).collect(),
            mask: DEFAULT_MASK.to_string(),
        }
    }

    pub fn add_key(mut self, key: impl AsRef<str>) -> Self {
        self.keys.insert(key.as_ref().to_lowercase());
        self
    }

    pub fn with_mask(mut self, mask: impl Into<String>) -> Self {
        self.mask = mask.into();
        self
    }

    pub fn mask(&self) -> &str {
        &self.mask
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        self.keys.contains(&key.to_lowercase())
    }

    /// Scrub a JSON tree in place
    pub fn scrub(&self, value: &mut Value) {
        match value {
            Value::Object(map) => self.scrub_object(map),
            Value::Array(items) => items.iter_mut().for_each(|item| self.scrub(item)),
            _ => {}
        }
    }

    fn scrub_object(&self, map: &mut Map<String, Value>) {
        for (key, value) in map.iter_mut() {
            if self.is_sensitive(key) {
                self.mask_leaves(value);
            } else if key == QUERY_STRING_KEY {
                match value {
                    Value::String(query) => *query = self.scrub_query_string(query),
                    other => self.scrub(other),
                }
            } else {
                self.scrub(value);
            }
        }
    }

    /// Replace every scalar under `value` with the mask, nulls included
    fn mask_leaves(&self, value: &mut Value) {
        match value {
            Value::Object(map) => map.values_mut().for_each(|v| self.mask_leaves(v)),
            Value::Array(items) => items.iter_mut().for_each(|v| self.mask_leaves(v)),
            leaf => *leaf = Value::String(self.mask.clone()),
        }
    }

    /// Mask the values of sensitive keys in a `k=v&k=v` query string
    ///
    /// Pairs are rewritten in place; everything else is kept byte for byte.
    pub fn scrub_query_string(&self, query: &str) -> String {
        query
            .split('&')
            .map(|pair| match pair.split_once('=') {
                Some((raw_key, _)) if self.is_sensitive(&decode_key(raw_key)) => {
                    format!("{}={}", raw_key, self.mask)
                }
                _ => pair.to_string(),
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl Default for Scrubber {
    fn default() -> Self {
        Self::with_keys(DEFAULT_SENSITIVE_KEYS)
    }
}

fn decode_key(raw_key: &str) -> String {
    url::form_urlencoded::parse(raw_key.as_bytes())
        .next()
        .map(|(key, _)| key.into_owned())
        .unwrap_or_else(|| raw_key.to_string())
}
