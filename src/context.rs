//! Request context capture
//!
//! The [`ContextFactory`] snapshots the in-flight HTTP request (if any) at the
//! moment an event is captured. Where the request comes from is abstracted by
//! [`RequestAccessor`], so the pipeline works the same inside an Actix handler,
//! in a background job (no request), or in tests with a fixed request.

use actix_web::web::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::{BodyReadError, RavenError};
use crate::reporter::{ErrorReporter, TracingReporter};
use crate::utils::truncate_body;

/// Maximum body size kept in a snapshot (10KB)
pub const MAX_BODY_SIZE: usize = 10 * 1024;

/// Snapshot of the HTTP request an event happened in
///
/// Serialized as the `request` field of the event payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RequestContext {
    pub url: String,

    pub method: String,

    /// Request body, parsed when JSON or form encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Raw query string without the leading `?`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_string: Option<String>,

    pub cookies: BTreeMap<String, String>,

    /// Lower-cased header names, repeated values joined by a space
    pub headers: BTreeMap<String, String>,

    pub env: BTreeMap<String, String>,
}

/// Reads the body of the in-flight request
pub trait BodyReader: Send + Sync {
    fn read_body(&self) -> Result<Bytes, BodyReadError>;
}

impl BodyReader for Bytes {
    fn read_body(&self) -> Result<Bytes, BodyReadError> {
        Ok(self.clone())
    }
}

impl BodyReader for Result<Bytes, BodyReadError> {
    fn read_body(&self) -> Result<Bytes, BodyReadError> {
        self.clone()
    }
}

/// Raw view of an inbound request, as handed over by the host framework
#[derive(Clone, Default)]
pub struct InboundRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, Vec<u8>)>,
    pub cookies: Vec<(String, String)>,
    pub query_string: Option<String>,
    pub env: BTreeMap<String, String>,
    pub body: Option<Arc<dyn BodyReader>>,
}

impl InboundRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, query_string: impl Into<String>) -> Self {
        self.query_string = Some(query_string.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, reader: impl BodyReader + 'static) -> Self {
        self.body = Some(Arc::new(reader));
        self
    }
}

impl fmt::Debug for InboundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("headers", &self.headers.len())
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Supplies the request currently being served, if any
pub trait RequestAccessor: Send + Sync {
    fn current(&self) -> Option<InboundRequest>;
}

/// Accessor for code that never runs inside a request
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRequest;

impl RequestAccessor for NoRequest {
    fn current(&self) -> Option<InboundRequest> {
        None
    }
}

/// Accessor that always returns the same request
#[derive(Debug, Clone)]
pub struct FixedRequest(pub InboundRequest);

impl RequestAccessor for FixedRequest {
    fn current(&self) -> Option<InboundRequest> {
        Some(self.0.clone())
    }
}

tokio::task_local! {
    static CURRENT_REQUEST: InboundRequest;
}

/// Accessor backed by a tokio task-local
///
/// [`RavenMiddleware`](crate::middleware::RavenMiddleware) runs every handler
/// inside [`TaskLocalRequest::scope`]. Outside a scope there is no request.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskLocalRequest;

impl TaskLocalRequest {
    /// Run `fut` with `request` as the current request
    pub async fn scope<F: Future>(request: InboundRequest, fut: F) -> F::Output {
        CURRENT_REQUEST.scope(request, fut).await
    }
}

impl RequestAccessor for TaskLocalRequest {
    fn current(&self) -> Option<InboundRequest> {
        CURRENT_REQUEST.try_with(|request| request.clone()).ok()
    }
}

/// Post-processing hook applied to every snapshot
pub type OnCreate = Arc<dyn Fn(Option<RequestContext>) -> Option<RequestContext> + Send + Sync>;

/// Builds [`RequestContext`] snapshots from the current request
#[derive(Clone)]
pub struct ContextFactory {
    accessor: Arc<dyn RequestAccessor>,
    on_create: OnCreate,
    reporter: Arc<dyn ErrorReporter>,
}

impl ContextFactory {
    pub fn new(accessor: Arc<dyn RequestAccessor>) -> Self {
        Self {
            accessor,
            on_create: Arc::new(|context: Option<RequestContext>| context),
            reporter: Arc::new(TracingReporter),
        }
    }

    /// Replace the `on_create` hook
    ///
    /// The hook sees every snapshot (or `None`) exactly once and its return
    /// value is what gets sent. Returning `None` drops the context.
    pub fn with_on_create<F>(mut self, on_create: F) -> Self
    where
        F: Fn(Option<RequestContext>) -> Option<RequestContext> + Send + Sync + 'static,
    {
        self.on_create = Arc::new(on_create);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Snapshot the current request
    ///
    /// Returns `None` when there is no request in flight, or when the
    /// `on_create` hook discards the snapshot.
    pub fn create(&self) -> Option<RequestContext> {
        let context = self.accessor.current().map(|request| self.capture(&request));
        (self.on_create)(context)
    }

    fn capture(&self, request: &InboundRequest) -> RequestContext {
        let headers = self.convert_headers(&request.headers);
        let data = self.convert_body(request, headers.get("content-type").map(String::as_str));

        RequestContext {
            url: request.path.clone(),
            method: request.method.clone(),
            data,
            query_string: request
                .query_string
                .as_deref()
                .map(|q| q.trim_start_matches('?'))
                .filter(|q| !q.is_empty())
                .map(str::to_string),
            cookies: request.cookies.iter().cloned().collect(),
            headers,
            env: request.env.clone(),
        }
    }

    fn convert_headers(&self, raw: &[(String, Vec<u8>)]) -> BTreeMap<String, String> {
        let mut headers: BTreeMap<String, String> = BTreeMap::new();

        for (name, value) in raw {
            let value = match std::str::from_utf8(value) {
                Ok(v) => v,
                Err(_) => {
                    self.reporter
                        .report(&RavenError::HeaderConversion { name: name.clone() });
                    continue;
                }
            };

            headers
                .entry(name.to_lowercase())
                .and_modify(|existing| {
                    existing.push(' ');
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        headers
    }

    fn convert_body(&self, request: &InboundRequest, content_type: Option<&str>) -> Option<Value> {
        let reader = request.body.as_ref()?;

        match reader.read_body() {
            Ok(bytes) => body_to_value(&bytes, content_type),
            Err(e) => {
                self.reporter.report(&RavenError::BodyRead(e));
                None
            }
        }
    }
}

impl Default for ContextFactory {
    fn default() -> Self {
        Self::new(Arc::new(NoRequest))
    }
}

impl fmt::Debug for ContextFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextFactory").finish_non_exhaustive()
    }
}

/// Convert a raw body into a JSON value based on its content type
///
/// Non UTF-8 bodies are dropped.
fn body_to_value(bytes: &[u8], content_type: Option<&str>) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }

    let text = std::str::from_utf8(bytes).ok()?;
    let content_type = content_type.unwrap_or_default().to_lowercase();

    if content_type.contains("json") && text.len() <= MAX_BODY_SIZE {
        if let Ok(value) = serde_json::from_str::<Value>(text) {
            return Some(value);
        }
    }

    if content_type.contains("x-www-form-urlencoded") && text.len() <= MAX_BODY_SIZE {
        let fields = url::form_urlencoded::parse(bytes)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect::<serde_json::Map<_, _>>();
        return Some(Value::Object(fields));
    }

    Some(Value::String(truncate_body(text, MAX_BODY_SIZE)))
}
