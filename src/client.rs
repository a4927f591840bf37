//! Long-lived Raven client
//!
//! Holds the configuration, redaction policy and context factory shared by
//! every delivery attempt, and turns attempt failures into reports on the
//! error side channel. Capturing an event never fails from the caller's
//! point of view: it yields the event id, or `None`.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::context::{ContextFactory, TaskLocalRequest};
use crate::dsn::Dsn;
use crate::error::Result;
use crate::packet::{JsonPacket, Level};
use crate::reporter::{ErrorReporter, TracingReporter};
use crate::requester::Requester;
use crate::scrub::Scrubber;

/// What a [`Requester`] needs from the client that owns it
pub trait PacketClient {
    /// Apply client-wide defaults to a packet
    fn prepare_packet(&self, packet: JsonPacket) -> JsonPacket;

    fn dsn(&self) -> Result<&Dsn>;

    fn timeout(&self) -> Duration;

    fn compression(&self) -> bool;

    /// Redaction policy, `None` sends payloads unscrubbed
    fn scrubber(&self) -> Option<&Scrubber>;

    fn context_factory(&self) -> &ContextFactory;

    /// Log outgoing payloads at debug level
    fn debug(&self) -> bool {
        false
    }
}

/// Body returned by the store endpoint
#[derive(Debug, Deserialize)]
struct StoreResponse {
    id: String,
}

pub struct RavenClient {
    config: Arc<Config>,
    scrubber: Option<Scrubber>,
    context_factory: ContextFactory,
    reporter: Arc<dyn ErrorReporter>,
}

impl RavenClient {
    /// Create a client that reads request context from [`TaskLocalRequest`]
    pub fn new(config: Config) -> Self {
        let reporter: Arc<dyn ErrorReporter> = Arc::new(TracingReporter);
        Self {
            config: config.into_arc(),
            scrubber: Some(Scrubber::default()),
            context_factory: ContextFactory::new(Arc::new(TaskLocalRequest))
                .with_reporter(reporter.clone()),
            reporter,
        }
    }

    pub fn from_env() -> Self {
        Self::new(Config::from_env())
    }

    pub fn with_scrubber(mut self, scrubber: Option<Scrubber>) -> Self {
        self.scrubber = scrubber;
        self
    }

    pub fn with_context_factory(mut self, context_factory: ContextFactory) -> Self {
        self.context_factory = context_factory;
        self
    }

    /// Replace the error reporter, for the client and its context factory
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.context_factory = self.context_factory.with_reporter(reporter.clone());
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.config.active
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Send an event and wait for the server-assigned id
    ///
    /// Returns `None` when the SDK is disabled or delivery failed. Failures are
    /// passed to the error reporter.
    pub async fn capture_event(&self, packet: JsonPacket) -> Option<String> {
        let requester = self.requester_for(packet)?;
        deliver(requester, self.reporter.clone()).await
    }

    pub async fn capture_message(&self, message: impl Into<String>, level: Level) -> Option<String> {
        self.capture_event(JsonPacket::with_message(message, level)).await
    }

    /// Send an event in the background
    ///
    /// Context is captured before spawning, so this must be called from the
    /// task serving the request. Must be called within a tokio runtime.
    pub fn spawn_capture(&self, packet: JsonPacket) -> Option<JoinHandle<Option<String>>> {
        let requester = self.requester_for(packet)?;
        let reporter = self.reporter.clone();
        Some(tokio::spawn(deliver(requester, reporter)))
    }

    fn requester_for(&self, packet: JsonPacket) -> Option<Requester> {
        // Silent skip if SDK is disabled (missing config)
        if !self.config.active {
            return None;
        }

        match Requester::new(packet, self) {
            Ok(requester) => Some(requester),
            Err(e) => {
                self.reporter.report(&e);
                None
            }
        }
    }
}

impl PacketClient for RavenClient {
    fn prepare_packet(&self, mut packet: JsonPacket) -> JsonPacket {
        if packet.project.is_none() {
            packet.project = self.config.dsn.as_ref().map(|dsn| dsn.project_id().to_string());
        }
        if packet.logger.is_none() {
            packet.logger = Some(self.config.logger.clone());
        }
        packet.server_name = packet.server_name.or_else(|| self.config.server_name.clone());
        packet.release = packet.release.or_else(|| self.config.release.clone());
        packet.environment = packet.environment.or_else(|| self.config.environment.clone());

        for (key, value) in &self.config.tags {
            packet
                .tags
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        packet
    }

    fn dsn(&self) -> Result<&Dsn> {
        self.config.get_dsn()
    }

    fn timeout(&self) -> Duration {
        self.config.timeout
    }

    fn compression(&self) -> bool {
        self.config.compression
    }

    fn scrubber(&self) -> Option<&Scrubber> {
        self.scrubber.as_ref()
    }

    fn context_factory(&self) -> &ContextFactory {
        &self.context_factory
    }

    fn debug(&self) -> bool {
        self.config.debug
    }
}

async fn deliver(requester: Requester, reporter: Arc<dyn ErrorReporter>) -> Option<String> {
    let event_id = requester.data().packet().event_id.clone();

    match requester.request().await {
        Ok(body) => {
            let id = extract_event_id(&body).unwrap_or(event_id);
            tracing::debug!(event_id = %id, "[Raven] event captured");
            Some(id)
        }
        Err(e) => {
            reporter.report(&e);
            None
        }
    }
}

/// Pull the event id out of a store response
///
/// Falls back to the trimmed body when it is not the usual `{"id": ...}`.
fn extract_event_id(body: &str) -> Option<String> {
    if let Ok(response) = serde_json::from_str::<StoreResponse>(body) {
        return Some(response.id);
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl std::fmt::Debug for RavenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RavenClient")
            .field("active", &self.config.active)
            .field("compression", &self.config.compression)
            .finish_non_exhaustive()
    }
}
